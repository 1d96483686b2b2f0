//! Chained traversal and pagination.
//!
//! A [`Path`] is a sequence of steps applied left to right, each to the
//! result of the previous one. `node.navigate(&path)` gives the same result
//! as taking the steps one by one.
//!
//! ```rust,ignore
//! let gadget = root.navigate(&Path::new().rel("xx:widgets").named("gadget1"))?;
//! let item = root.navigate(&Path::new().rel("find").var("id", 7))?;
//! ```

use std::iter::FusedIterator;

use serde_json::Value;

use crate::error::NavError;
use crate::node::Node;
use crate::relation::{Relation, Target, TargetList};
use crate::template::{TemplateValue, Variables};

/// One traversal step.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// Follow a relation from the current resource.
    Rel(String),
    /// Pick the target whose link has this `name`.
    Named(String),
    /// Pick the first target whose link attribute equals the value.
    By { attr: String, value: Value },
    /// Pick a target by position.
    Index(usize),
    /// Bind one template variable. The template turns into a resource once
    /// nothing remains unbound.
    Var(String, TemplateValue),
    /// Expand the current template with whatever is bound.
    Complete,
}

/// A chain of [`Step`]s.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Path {
    steps: Vec<Step>,
}

impl Path {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rel(mut self, rel: impl Into<String>) -> Self {
        self.steps.push(Step::Rel(rel.into()));
        self
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.steps.push(Step::Named(name.into()));
        self
    }

    pub fn by(mut self, attr: impl Into<String>, value: impl Into<Value>) -> Self {
        self.steps.push(Step::By {
            attr: attr.into(),
            value: value.into(),
        });
        self
    }

    pub fn index(mut self, index: usize) -> Self {
        self.steps.push(Step::Index(index));
        self
    }

    pub fn var(mut self, name: impl Into<String>, value: impl Into<TemplateValue>) -> Self {
        self.steps.push(Step::Var(name.into(), value.into()));
        self
    }

    pub fn complete(mut self) -> Self {
        self.steps.push(Step::Complete);
        self
    }

    pub fn push(&mut self, step: Step) {
        self.steps.push(step);
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// A path of plain relation steps.
impl<S: Into<String>> FromIterator<S> for Path {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            steps: iter.into_iter().map(|r| Step::Rel(r.into())).collect(),
        }
    }
}

/// Where a traversal stands between steps. A relation just followed stays
/// a list until the next step shows whether a selection follows.
enum Cursor {
    Pending(TargetList),
    Settled(Relation),
}

impl Cursor {
    fn settle(self) -> Relation {
        match self {
            Cursor::Pending(list) => list.collapse(),
            Cursor::Settled(relation) => relation,
        }
    }

    fn select(
        self,
        detail: impl FnOnce() -> String,
        pick: impl FnOnce(&TargetList) -> Option<&Target>,
    ) -> Result<Cursor, NavError> {
        let list = match self {
            Cursor::Pending(list) | Cursor::Settled(Relation::List(list)) => list,
            Cursor::Settled(Relation::Resource(node)) => {
                return Err(NavError::NoMatch {
                    rel: node.describe(),
                    detail: format!("{} (not a multi-valued relation)", detail()),
                })
            }
            Cursor::Settled(Relation::Template(template)) => return Err(template.unbound()),
        };
        match pick(&list) {
            Some(target) => Ok(Cursor::Settled(target.clone().into())),
            None => Err(NavError::NoMatch {
                rel: list.rel().to_string(),
                detail: detail(),
            }),
        }
    }
}

impl Node {
    /// Apply `path` starting from this node.
    pub fn navigate(&self, path: &Path) -> Result<Relation, NavError> {
        let mut cursor = Cursor::Settled(Relation::Resource(self.clone()));
        for step in path.steps() {
            cursor = match step {
                Step::Rel(rel) => Cursor::Pending(cursor.settle().into_resource()?.targets(rel)?),
                Step::Named(name) => cursor.select(|| format!("name {name:?}"), |l| l.named(name))?,
                Step::By { attr, value } => {
                    cursor.select(|| format!("{attr} = {value}"), |l| l.get_by(attr, value.clone()))?
                }
                Step::Index(i) => cursor.select(|| format!("index {i}"), |l| l.get(*i))?,
                Step::Var(name, value) => {
                    let vars = Variables::new().with(name.clone(), value.clone());
                    Cursor::Settled(cursor.settle().into_template()?.expand(&vars)?)
                }
                Step::Complete => Cursor::Settled(Relation::Resource(cursor.settle().into_template()?.complete()?)),
            };
        }
        Ok(cursor.settle())
    }

    /// Follow a chain of relations, each of which must resolve to a single
    /// resource except possibly the last.
    pub fn follow(&self, rels: &[&str]) -> Result<Relation, NavError> {
        self.navigate(&rels.iter().copied().collect())
    }

    /// The resource behind this one's `next` link.
    ///
    /// Returns [`NavError::IterationExhausted`] when there is no `next`.
    pub fn next_page(&self) -> Result<Node, NavError> {
        match self.get("next") {
            Ok(Relation::List(list)) if list.is_empty() => Err(NavError::IterationExhausted { uri: self.describe() }),
            Ok(relation) => relation.into_resource(),
            Err(NavError::RelationNotFound { .. }) => Err(NavError::IterationExhausted { uri: self.describe() }),
            Err(e) => Err(e),
        }
    }

    /// This node followed by each `next` page, fetched lazily.
    pub fn pages(&self) -> Pages {
        Pages {
            current: Some(self.clone()),
            started: false,
        }
    }
}

/// Lazy, forward-only iterator over a `next`-linked sequence. The first item
/// is the starting node. A failure is yielded once and ends the sequence.
#[derive(Debug, Clone)]
pub struct Pages {
    current: Option<Node>,
    started: bool,
}

impl Iterator for Pages {
    type Item = Result<Node, NavError>;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.current.take()?;
        if !self.started {
            self.started = true;
            self.current = Some(current.clone());
            return Some(Ok(current));
        }
        match current.next_page() {
            Ok(next) => {
                self.current = Some(next.clone());
                Some(Ok(next))
            }
            Err(e) if e.is_exhausted() => None,
            Err(e) => Some(Err(e)),
        }
    }
}

impl FusedIterator for Pages {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use serde_json::json;

    use crate::node::{OnError, Status};
    use crate::session::Session;
    use crate::template::TemplateError;
    use crate::testing::MockTransport;
    use crate::transport::Method;

    const ROOT: &str = "http://www.example.com/";

    fn at(path: &str) -> String {
        format!("{ROOT}{path}")
    }

    fn api() -> Arc<MockTransport> {
        Arc::new(
            MockTransport::new()
                .hal(
                    ROOT,
                    json!({
                        "_links": {
                            "self": {"href": "/"},
                            "curies": [{"name": "xx", "href": "http://docs.example.com/rels/{rel}", "templated": true}],
                            "xx:widgets": [
                                {"href": "/w/1", "name": "widget1", "profile": "widget"},
                                {"href": "/w/2", "name": "widget2", "profile": "widget"},
                                {"href": "/g/1", "name": "gadget1", "profile": "gadget"}
                            ],
                            "first": {"href": "/w/1"},
                            "about": {"href": "/about/"},
                            "find": {"href": "/find/{kind}/{id}{?q}", "templated": true},
                            "next": {"href": "/page/2"},
                            "xx:nonstandard-rel": {"href": "/custom"}
                        }
                    }),
                )
                .hal(&at("w/1"), json!({"name": "widget one", "_links": {"owner": {"href": "/people/1"}}}))
                .hal(&at("people/1"), json!({"name": "Ada"}))
                .hal(
                    &at("about/"),
                    json!({"_links": {"alternate": {"href": "alternate"}, "index": {"href": "./index"}}}),
                ),
        )
    }

    fn session(mock: &Arc<MockTransport>) -> Session {
        Session::builder(ROOT, Arc::clone(mock)).build().unwrap()
    }

    #[test]
    fn same_uri_through_different_paths_is_one_node() {
        let mock = api();
        let s = session(&mock);
        let via_first = s.root().get("first").unwrap().into_resource().unwrap();
        let via_named = s
            .root()
            .navigate(&Path::new().rel("xx:widgets").named("widget1"))
            .unwrap()
            .into_resource()
            .unwrap();
        assert!(via_first.ptr_eq(&via_named));

        via_first.fetch().unwrap();
        assert_eq!(via_named.status(), Status::Fetched);
        assert_eq!(via_named.state().unwrap()["name"], json!("widget one"));
        assert_eq!(mock.calls(Method::Get, &at("w/1")), 1);
    }

    #[test]
    fn links_are_idempotent_with_one_request() {
        let mock = api();
        let s = session(&mock);
        let first = s.root().links().unwrap();
        let second = s.root().links().unwrap();
        assert_eq!(first, second);
        assert_eq!(mock.calls(Method::Get, ROOT), 1);
    }

    #[test]
    fn multi_valued_relation_disambiguation() {
        let mock = api();
        let s = session(&mock);
        let widgets = s.root().get("xx:widgets").unwrap().into_list().unwrap();
        assert_eq!(widgets.len(), 3);

        let gadget = widgets.named("gadget1").unwrap().as_resource().unwrap();
        assert_eq!(gadget.uri(), Some(at("g/1").as_str()));

        let found: Vec<_> = widgets
            .get_all_by("profile", "widget")
            .into_iter()
            .filter_map(Target::as_resource)
            .map(|n| n.uri().unwrap().to_string())
            .collect();
        assert_eq!(found, vec![at("w/1"), at("w/2")]);
        assert!(widgets.named("gadget2").is_none());
        assert_eq!(mock.calls(Method::Get, &at("g/1")), 0);
    }

    #[test]
    fn selection_failures() {
        let mock = api();
        let s = session(&mock);
        let err = s
            .root()
            .navigate(&Path::new().rel("xx:widgets").named("gadget2"))
            .unwrap_err();
        assert!(matches!(err, NavError::NoMatch { ref rel, .. } if rel == "xx:widgets"));

        let err = s.root().follow(&["xx:widgets", "owner"]).unwrap_err();
        assert!(matches!(err, NavError::AmbiguousRelation { count: 3, .. }));

        let err = s.root().get("missing").unwrap_err();
        assert!(matches!(err, NavError::RelationNotFound { .. }));
        assert!(!s.root().contains("missing").unwrap());
    }

    #[test]
    fn selection_applies_to_single_link_relations() {
        let mock = api();
        let s = session(&mock);
        let first = s
            .root()
            .navigate(&Path::new().rel("first").index(0))
            .unwrap()
            .into_resource()
            .unwrap();
        assert_eq!(first.uri(), Some(at("w/1").as_str()));
    }

    #[test]
    fn chained_equals_stepwise() {
        let mock = api();
        let s = session(&mock);
        let chained = s.root().follow(&["first", "owner"]).unwrap().into_resource().unwrap();
        let stepwise = s
            .root()
            .get("first")
            .unwrap()
            .into_resource()
            .unwrap()
            .get("owner")
            .unwrap()
            .into_resource()
            .unwrap();
        assert!(chained.ptr_eq(&stepwise));
        assert_eq!(chained.state().unwrap()["name"], json!("Ada"));
    }

    #[test]
    fn template_round_trip() {
        let mock = api();
        let s = session(&mock);
        let find = s.root().get("find").unwrap().into_template().unwrap();
        assert_eq!(find.template_uri(), "http://www.example.com/find/{kind}/{id}{?q}");
        assert_eq!(find.variables(), vec!["kind", "id", "q"]);

        let partial = find.bind(&Variables::new().with("kind", "widget")).unwrap();
        assert_eq!(
            partial.remaining().into_iter().collect::<Vec<_>>(),
            vec!["id".to_string(), "q".to_string()]
        );
        let stepwise = partial
            .expand(&Variables::new().with("id", 3).with("q", "blue"))
            .unwrap()
            .into_resource()
            .unwrap();
        let direct = find
            .expand(&Variables::new().with("kind", "widget").with("id", 3).with("q", "blue"))
            .unwrap()
            .into_resource()
            .unwrap();
        assert!(stepwise.ptr_eq(&direct));
        assert_eq!(direct.uri(), Some("http://www.example.com/find/widget/3?q=blue"));
        assert_eq!(direct.status(), Status::Unfetched);
    }

    #[test]
    fn partial_expansion_stays_templated_and_unbound_cannot_be_followed() {
        let mock = api();
        let s = session(&mock);
        let find = s.root().get("find").unwrap().into_template().unwrap();
        let partial = find.expand(&Variables::new().with("id", 1)).unwrap();
        let partial = partial.into_template().unwrap();
        assert!(partial.remaining().contains("kind"));

        let err = s.root().follow(&["find", "owner"]).unwrap_err();
        assert!(matches!(err, NavError::Template(TemplateError::Unbound { .. })));
    }

    #[test]
    fn unknown_template_variable_is_rejected() {
        let mock = api();
        let s = session(&mock);
        let find = s.root().get("find").unwrap().into_template().unwrap();
        let err = find.expand(&Variables::new().with("colour", "red")).unwrap_err();
        assert!(matches!(
            err,
            NavError::Template(TemplateError::UnknownVariable { ref name, .. }) if name == "colour"
        ));
    }

    #[test]
    fn template_steps_in_a_path() {
        let mock = api();
        let s = session(&mock);
        let node = s
            .root()
            .navigate(&Path::new().rel("find").var("kind", "gadget").var("id", 9).complete())
            .unwrap()
            .into_resource()
            .unwrap();
        assert_eq!(node.uri(), Some("http://www.example.com/find/gadget/9"));

        let node = s
            .root()
            .navigate(&Path::new().rel("find").var("kind", "gadget").complete())
            .unwrap()
            .into_resource()
            .unwrap();
        assert_eq!(node.uri(), Some("http://www.example.com/find/gadget/"));

        // Binding the last variable already yields a resource.
        let err = s
            .root()
            .navigate(&Path::new().rel("find").var("kind", "a").var("id", 1).var("q", "x").complete())
            .unwrap_err();
        assert!(matches!(err, NavError::NotTemplated { .. }));
    }

    #[test]
    fn expand_link_keeps_attributes() {
        let mock = api();
        let s = session(&mock);
        let find = s.root().get("find").unwrap().into_template().unwrap();
        let link = find
            .expand_link(&Variables::new().with("kind", "a").with("id", "b"))
            .unwrap();
        assert_eq!(link.href, "http://www.example.com/find/a/b");
        assert!(!link.templated);
        assert_eq!(link.rel, "find");
        assert_eq!(find.parameters().len(), 3);
    }

    #[test]
    fn relative_links_resolve_against_containing_resource() {
        let mock = api();
        let s = session(&mock);
        let about = s.root().get("about").unwrap().into_resource().unwrap();
        let alternate = about.get("alternate").unwrap().into_resource().unwrap();
        let index = about.get("index").unwrap().into_resource().unwrap();
        assert_eq!(alternate.uri(), Some("http://www.example.com/about/alternate"));
        assert_eq!(index.uri(), Some("http://www.example.com/about/index"));
    }

    #[test]
    fn default_curie_lookups() {
        let mock = Arc::new(MockTransport::new().hal(
            ROOT,
            json!({"_links": {
                "curies": [{"name": "xx", "href": "http://docs.example.com/rels/{rel}", "templated": true}],
                "xx:nonstandard-rel": {"href": "/custom"},
                "next": {"href": "/iana-next"},
                "xx:next": {"href": "/custom-next"},
                "xx:only-prefixed": {"href": "/prefixed"}
            }}),
        ));
        let s = Session::builder(ROOT, Arc::clone(&mock))
            .default_curie("xx")
            .build()
            .unwrap();
        let root = s.root();
        let uri_of = |rel: &str| {
            root.get(rel)
                .unwrap()
                .into_resource()
                .unwrap()
                .uri()
                .unwrap()
                .to_string()
        };
        assert_eq!(uri_of("nonstandard-rel"), at("custom"));
        assert_eq!(uri_of("xx:nonstandard-rel"), at("custom"));
        assert_eq!(uri_of("next"), at("iana-next"));
        assert_eq!(uri_of("xx:next"), at("custom-next"));
        assert_eq!(uri_of("only-prefixed"), at("prefixed"));
        assert_eq!(
            uri_of("http://docs.example.com/rels/nonstandard-rel"),
            at("custom")
        );
        assert!(root.contains("only-prefixed").unwrap());
        assert_eq!(
            root.docs_uri("nonstandard-rel").unwrap(),
            "http://docs.example.com/rels/nonstandard-rel"
        );
    }

    #[test]
    fn embedded_resources_are_transparent() {
        let mock = Arc::new(MockTransport::new().hal(
            ROOT,
            json!({
                "_links": {"xx:item": {"href": "/items/1"}},
                "_embedded": {
                    "xx:item": {
                        "_links": {"self": {"href": "/items/1"}},
                        "colour": "red",
                        "_embedded": {
                            "part": [
                                {"_links": {"self": {"href": "/parts/a"}}, "n": 1},
                                {"n": 2}
                            ]
                        }
                    }
                }
            }),
        ));
        let s = session(&mock);
        let item = s.root().get("xx:item").unwrap().into_resource().unwrap();
        assert_eq!(item.status(), Status::Fetched);
        assert_eq!(item.state().unwrap()["colour"], json!("red"));
        assert!(item.ptr_eq(&s.node("/items/1").unwrap()));

        let parts = item.get("part").unwrap().into_list().unwrap();
        let first = parts.get(0).unwrap().as_resource().unwrap();
        assert_eq!(first.uri(), Some(at("parts/a").as_str()));
        assert_eq!(first.state().unwrap()["n"], json!(1));
        let anonymous = parts.get_by("n", 2).unwrap().as_resource().unwrap();
        assert!(anonymous.is_orphan());
        assert!(anonymous.parent().unwrap().ptr_eq(&item));
        assert_eq!(anonymous.state().unwrap()["n"], json!(2));

        assert_eq!(mock.total_calls(), 1);
    }

    #[test]
    fn embedded_only_relation_without_links() {
        let mock = Arc::new(MockTransport::new().hal(
            ROOT,
            json!({"_embedded": {"single": {"value": 1}}}),
        ));
        let s = session(&mock);
        let single = s.root().get("single").unwrap().into_resource().unwrap();
        assert!(single.is_orphan());
        assert!(!s.identity_map().uris().iter().any(|u| u.contains("single")));
        assert_eq!(single.state().unwrap()["value"], json!(1));
    }

    #[test]
    fn empty_relations_are_present_but_empty() {
        let mock = Arc::new(MockTransport::new().hal(
            ROOT,
            json!({"_links": {"item": [], "next": []}, "_embedded": {"orders": []}}),
        ));
        let s = session(&mock);

        let items = s.root().get("item").unwrap().into_list().unwrap();
        assert!(items.is_empty());
        assert_eq!(items.rel(), "item");
        let orders = s.root().get("orders").unwrap().into_list().unwrap();
        assert!(orders.is_empty());
        assert!(s.root().contains("item").unwrap());
        assert!(s.root().contains("orders").unwrap());
        assert!(!s.root().contains("missing").unwrap());

        let err = s.root().get("orders").unwrap().into_resource().unwrap_err();
        assert!(matches!(err, NavError::NoMatch { ref rel, .. } if rel == "orders"));
        let err = s.root().navigate(&Path::new().rel("item").index(0)).unwrap_err();
        assert!(matches!(err, NavError::NoMatch { .. }));

        // An empty `next` ends pagination like a missing one.
        assert!(s.root().next_page().unwrap_err().is_exhausted());
        assert_eq!(s.root().pages().count(), 1);
    }

    #[test]
    fn templates_starting_with_an_expression_resolve_against_their_resource() {
        let api = at("api/");
        let mock = Arc::new(MockTransport::new().hal(
            &api,
            json!({"_links": {
                "search": {"href": "{?q}", "templated": true},
                "byid": {"href": "{id}", "templated": true},
                "nested": {"href": "{/coll}{/id}", "templated": true}
            }}),
        ));
        let s = session(&mock);
        let node = s.node("api/").unwrap();

        let search = node.get("search").unwrap().into_template().unwrap();
        let found = search.expand(&Variables::new().with("q", "blue")).unwrap().into_resource().unwrap();
        assert_eq!(found.uri(), Some(at("api/?q=blue").as_str()));

        let byid = node.get("byid").unwrap().into_template().unwrap();
        let seven = byid.expand(&Variables::new().with("id", 7)).unwrap().into_resource().unwrap();
        assert_eq!(seven.uri(), Some(at("api/7").as_str()));
        assert!(seven.ptr_eq(&s.node("api/7").unwrap()));

        let nested = node.get("nested").unwrap().into_template().unwrap();
        assert_eq!(
            nested.expand_uri(&Variables::new().with("coll", "w").with("id", "1")).unwrap(),
            at("w/1")
        );
        assert_eq!(search.complete().unwrap().uri(), Some(api.as_str()));
    }

    fn paged(pages: usize) -> Arc<MockTransport> {
        let mut mock = MockTransport::new();
        for n in 1..=pages {
            let mut links = json!({"self": {"href": format!("/page/{n}")}});
            if n < pages {
                links["next"] = json!({"href": format!("/page/{}", n + 1)});
            }
            mock = mock.hal(&at(&format!("page/{n}")), json!({"n": n, "_links": links}));
        }
        Arc::new(mock)
    }

    #[test]
    fn pagination_yields_each_page_once() {
        let mock = paged(5);
        let s = session(&mock);
        let first = s.node("page/1").unwrap();
        let numbers: Vec<u64> = first
            .pages()
            .map(|page| page.unwrap().state().unwrap()["n"].as_u64().unwrap())
            .collect();
        assert_eq!(numbers, vec![1, 2, 3, 4, 5]);
        for n in 1..=5 {
            assert_eq!(mock.calls(Method::Get, &at(&format!("page/{n}"))), 1);
        }

        // Restartable from any page.
        assert_eq!(first.pages().count(), 5);
    }

    #[test]
    fn next_page_signals_exhaustion() {
        let mock = paged(2);
        let s = session(&mock);
        let second = s.node("page/1").unwrap().next_page().unwrap();
        let err = second.next_page().unwrap_err();
        assert!(err.is_exhausted());
        assert!(!matches!(err, NavError::RelationNotFound { .. }));
    }

    #[test]
    fn pagination_stops_at_a_failing_page() {
        let mock = Arc::new(
            MockTransport::new()
                .hal(&at("page/1"), json!({"_links": {"next": {"href": "/page/2"}}}))
                .respond(Method::Get, &at("page/2"), MockTransport::json(500, json!({}))),
        );
        let s = session(&mock);
        let results: Vec<_> = s.node("page/1").unwrap().pages().collect();
        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert!(results[1].is_ok());
        assert_eq!(results[2].as_ref().unwrap_err().status(), Some(500));
    }

    #[test]
    fn relation_from_lenient_error_node() {
        let mock = Arc::new(MockTransport::new().respond(Method::Get, ROOT, MockTransport::json(404, json!({}))));
        let s = session(&mock);
        s.root().state_with(OnError::Return).unwrap();
        assert!(matches!(s.root().get("next"), Err(NavError::ErrorResource { .. })));
    }
}
