use core_types::ResourceKind;
use dom_stream::{DestinationTree, one_shot_inner_html};
use include::{CrossOrigin, IncludeError, LoadState, StreamingInclude};
use runtime_parse::{StreamConfig, StreamError};
use std::fs;
use std::path::PathBuf;
use url::Url;

fn fixture_dir(test: &str) -> PathBuf {
    let dir = std::env::temp_dir()
        .join(format!("include-tests-{}", std::process::id()))
        .join(test);
    fs::create_dir_all(&dir).unwrap();
    dir
}

fn write_page(test: &str, name: &str, markup: &str) -> Url {
    let path = fixture_dir(test).join(name);
    fs::write(&path, markup).unwrap();
    Url::from_file_path(&path).unwrap()
}

fn include() -> StreamingInclude<DestinationTree> {
    StreamingInclude::new(DestinationTree::new())
}

#[test]
fn without_src_there_is_nothing_to_load() {
    let mut element = include();
    element.connect();
    assert_eq!(element.src(), "");
    assert!(matches!(element.parsed(), LoadState::Idle));
    element.set_src("https://example.com/x.html");
    let first = element.abort_handle().expect("load requested");
    element.remove_src();
    assert!(first.is_aborted());
    assert!(matches!(element.parsed(), LoadState::Idle));
    assert_eq!(element.generation(), 1);
}

#[test]
fn invalid_src_fails_before_any_work() {
    let mut element = include();
    element.set_src("not a url");
    assert_eq!(element.src(), "not a url");
    assert!(matches!(
        element.state(),
        LoadState::Failed(IncludeError::InvalidSrc(src)) if src == "not a url"
    ));
    assert_eq!(element.generation(), 0);
    assert!(element.abort_handle().is_none());
}

#[test]
fn attribute_changes_follow_image_rules() {
    let base = Url::parse("https://example.com/app/").unwrap();
    let mut element = include().with_base(base);
    element.set_src("part.html");
    assert_eq!(element.src(), "https://example.com/app/part.html");
    assert_eq!(element.generation(), 1);

    element.set_src("part.html");
    assert_eq!(element.generation(), 2, "same src still reloads");

    element.set_cross_origin(Some("anonymous"));
    assert_eq!(element.generation(), 2, "computed value unchanged");
    element.set_cross_origin(Some("USE-CREDENTIALS"));
    assert_eq!(element.cross_origin(), CrossOrigin::UseCredentials);
    assert_eq!(element.generation(), 3);
    element.set_cross_origin(Some("use-credentials"));
    assert_eq!(element.generation(), 3);
    element.set_cross_origin(None);
    assert_eq!(element.generation(), 4);
    assert!(element.state().is_pending());
}

#[test]
fn loads_wait_for_connection() {
    let page = write_page("connect", "page.html", "<p>hello</p>");
    let mut element = include();
    element.set_src(page.as_str());
    assert!(element.parsed().is_pending());
    assert_eq!(element.destination().inner_html(), "");

    element.connect();
    let LoadState::Loaded(summary) = element.parsed() else {
        panic!("expected a completed load");
    };
    assert_eq!(summary.content_type.as_deref(), Some("text/html"));
    assert_eq!(element.destination().inner_html(), "<p>hello</p>");
}

#[test]
fn streamed_content_matches_a_one_shot_parse_and_watches_resources() {
    let markup = "<link rel=stylesheet href=site.css><b><p>Bold </b> Not bold</p>\
<img src=img/a.png><script src=app.js></script><iframe src=frame.html></iframe>";
    let page = write_page("resources", "page.html", markup);
    let mut element = include().with_stream_config(StreamConfig {
        read_chunk_size: 3,
        ..StreamConfig::default()
    });
    element.connect();
    element.set_src(page.as_str());
    assert!(matches!(element.parsed(), LoadState::Loaded(_)));
    assert_eq!(element.destination().inner_html(), one_shot_inner_html(markup));

    let resources = element.resources();
    let kinds: Vec<ResourceKind> = resources.iter().map(|resource| resource.kind).collect();
    assert_eq!(
        kinds,
        [
            ResourceKind::Css,
            ResourceKind::Image,
            ResourceKind::Script,
            ResourceKind::Html
        ]
    );
    assert_eq!(resources[1].url, page.join("img/a.png").unwrap().as_str());
    assert_eq!(element.destination().executed_scripts().len(), 1);
}

#[test]
fn reload_replaces_the_previous_content() {
    let first = write_page("reload", "first.html", "<p>first</p>");
    let second = write_page("reload", "second.html", "<p>second</p>");
    let mut element = include();
    element.connect();
    element.set_src(first.as_str());
    assert!(matches!(element.parsed(), LoadState::Loaded(_)));
    assert_eq!(element.destination().inner_html(), "<p>first</p>");

    element.set_src(second.as_str());
    assert_eq!(element.destination().inner_html(), "", "cleared on reload");
    assert!(matches!(element.parsed(), LoadState::Loaded(_)));
    assert_eq!(element.destination().inner_html(), "<p>second</p>");
}

#[test]
fn abort_before_the_load_runs() {
    let page = write_page("abort", "page.html", "<p>never</p>");
    let mut element = include();
    element.set_src(page.as_str());
    let handle = element.abort_handle().expect("load requested");
    element.abort();
    assert!(handle.is_aborted());
    element.connect();
    assert!(matches!(element.parsed(), LoadState::Failed(IncludeError::Aborted)));
    assert_eq!(element.destination().inner_html(), "");
}

#[test]
fn missing_documents_fail_with_a_source_error() {
    let missing = fixture_dir("missing").join("nope.html");
    let url = Url::from_file_path(&missing).unwrap();
    let mut element = include();
    element.connect();
    element.set_src(url.as_str());
    let err = element.parsed().error().expect("load fails");
    assert!(matches!(err, IncludeError::Stream(StreamError::Source(_))));
    assert!(std::error::Error::source(err).is_some());
}
