use super::{ScratchData, ScratchElement, ScratchId, ScratchTree};
use html5ever::tendril::StrTendril;
use html5ever::tree_builder::{ElementFlags, NextParserState, NodeOrText, QuirksMode, TreeSink};
use html5ever::{Attribute, ExpandedName, QualName};
use std::borrow::Cow;
use std::collections::HashSet;

impl ScratchTree {
    fn mark_already_started(&mut self, id: ScratchId) {
        if let ScratchData::Element(element) = &mut self.nodes[id.index()].data {
            element.already_started = true;
        }
    }
}

impl TreeSink for ScratchTree {
    type Handle = ScratchId;
    type Output = Self;

    fn finish(self) -> Self {
        self
    }

    fn parse_error(&mut self, msg: Cow<'static, str>) {
        self.parse_errors += 1;
        log::trace!(target: "dom_stream.scratch", "parse error: {msg}");
    }

    fn get_document(&mut self) -> ScratchId {
        ScratchId::DOCUMENT
    }

    fn elem_name<'a>(&'a self, target: &'a ScratchId) -> ExpandedName<'a> {
        match self.element(*target) {
            Some(element) => element.name.expanded(),
            None => self.placeholder_name.expanded(),
        }
    }

    fn create_element(
        &mut self,
        name: QualName,
        attrs: Vec<Attribute>,
        flags: ElementFlags,
    ) -> ScratchId {
        let id = self.push_node(ScratchData::Element(ScratchElement {
            name,
            attributes: attrs,
            template_contents: None,
            mathml_annotation_xml_integration_point: flags
                .mathml_annotation_xml_integration_point,
            already_started: false,
        }));
        if flags.template {
            let fragment = self.push_node(ScratchData::Fragment { host: Some(id) });
            if let ScratchData::Element(element) = &mut self.nodes[id.index()].data {
                element.template_contents = Some(fragment);
            }
        }
        id
    }

    fn create_comment(&mut self, text: StrTendril) -> ScratchId {
        self.push_node(ScratchData::Comment(text.to_string()))
    }

    fn create_pi(&mut self, target: StrTendril, data: StrTendril) -> ScratchId {
        // Only reachable from XML tokenization; kept as a bogus comment like HTML does.
        self.push_node(ScratchData::Comment(format!("?{target} {data}")))
    }

    fn append(&mut self, parent: &ScratchId, child: NodeOrText<ScratchId>) {
        match child {
            NodeOrText::AppendNode(node) => self.insert(*parent, node, None),
            NodeOrText::AppendText(text) => self.insert_text(*parent, &text, None),
        }
    }

    fn append_based_on_parent_node(
        &mut self,
        element: &ScratchId,
        prev_element: &ScratchId,
        child: NodeOrText<ScratchId>,
    ) {
        if self.parent(*element).is_some() {
            self.append_before_sibling(element, child);
        } else {
            self.append(prev_element, child);
        }
    }

    fn append_doctype_to_document(
        &mut self,
        name: StrTendril,
        public_id: StrTendril,
        system_id: StrTendril,
    ) {
        let doctype = self.push_node(ScratchData::Doctype {
            name: name.to_string(),
            public_id: public_id.to_string(),
            system_id: system_id.to_string(),
        });
        self.insert(ScratchId::DOCUMENT, doctype, None);
    }

    fn mark_script_already_started(&mut self, node: &ScratchId) {
        self.mark_already_started(*node);
    }

    fn pop(&mut self, node: &ScratchId) {
        // A script leaving the stack of open elements has been prepared.
        if self.element(*node).is_some_and(ScratchElement::is_script) {
            self.mark_already_started(*node);
        }
    }

    fn get_template_contents(&mut self, target: &ScratchId) -> ScratchId {
        if let Some(fragment) = self.template_contents(*target) {
            return fragment;
        }
        let fragment = self.push_node(ScratchData::Fragment {
            host: Some(*target),
        });
        if let ScratchData::Element(element) = &mut self.nodes[target.index()].data {
            element.template_contents = Some(fragment);
        }
        fragment
    }

    fn same_node(&self, x: &ScratchId, y: &ScratchId) -> bool {
        x == y
    }

    fn set_quirks_mode(&mut self, mode: QuirksMode) {
        self.quirks_mode = mode;
    }

    fn append_before_sibling(&mut self, sibling: &ScratchId, new_node: NodeOrText<ScratchId>) {
        let Some(parent) = self.parent(*sibling) else {
            log::warn!(target: "dom_stream.scratch", "insert before detached {sibling:?} ignored");
            return;
        };
        match new_node {
            NodeOrText::AppendNode(node) => self.insert(parent, node, Some(*sibling)),
            NodeOrText::AppendText(text) => self.insert_text(parent, &text, Some(*sibling)),
        }
    }

    fn add_attrs_if_missing(&mut self, target: &ScratchId, attrs: Vec<Attribute>) {
        let ScratchData::Element(element) = &mut self.nodes[target.index()].data else {
            return;
        };
        let present: HashSet<QualName> = element
            .attributes
            .iter()
            .map(|attr| attr.name.clone())
            .collect();
        element
            .attributes
            .extend(attrs.into_iter().filter(|attr| !present.contains(&attr.name)));
    }

    fn remove_from_parent(&mut self, target: &ScratchId) {
        self.detach(*target);
    }

    fn reparent_children(&mut self, node: &ScratchId, new_parent: &ScratchId) {
        self.move_children(*node, *new_parent);
    }

    fn is_mathml_annotation_xml_integration_point(&self, handle: &ScratchId) -> bool {
        self.element(*handle)
            .is_some_and(|element| element.mathml_annotation_xml_integration_point)
    }

    fn complete_script(&mut self, node: &ScratchId) -> NextParserState {
        self.mark_already_started(*node);
        NextParserState::Continue
    }
}
