use core_types::CredentialsMode;
use url::Url;

/// Computed value of the `crossorigin` attribute.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CrossOrigin {
    #[default]
    Anonymous,
    UseCredentials,
}

impl CrossOrigin {
    /// Only `use-credentials` (any ASCII case) is special; everything else,
    /// a missing attribute included, is anonymous.
    pub fn from_attribute(value: Option<&str>) -> Self {
        match value {
            Some(value) if value.eq_ignore_ascii_case("use-credentials") => {
                CrossOrigin::UseCredentials
            }
            _ => CrossOrigin::Anonymous,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CrossOrigin::Anonymous => "anonymous",
            CrossOrigin::UseCredentials => "use-credentials",
        }
    }

    pub fn credentials(self) -> CredentialsMode {
        match self {
            CrossOrigin::Anonymous => CredentialsMode::SameOrigin,
            CrossOrigin::UseCredentials => CredentialsMode::Include,
        }
    }
}

/// Reflected `src`: empty when absent, resolved against `base` when it
/// parses, the raw attribute otherwise.
pub fn reflect_url(value: Option<&str>, base: Option<&Url>) -> String {
    let Some(value) = value else {
        return String::new();
    };
    match Url::options().base_url(base).parse(value) {
        Ok(url) => url.to_string(),
        Err(_) => value.to_string(),
    }
}
