//! The results of following a relation.
//!
//! | Variant | When |
//! |---------|------|
//! | [`Relation::Resource`] | exactly one non-templated link, or one embedded document |
//! | [`Relation::Template`] | exactly one templated link |
//! | [`Relation::List`] | several links (or embedded documents) share the relation |
//!
//! A [`TargetList`] pairs each target with the link it came from, so the
//! caller can pick one by any link attribute.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::error::NavError;
use crate::link::{value_matches, Link};
use crate::node::Node;
use crate::session::SessionInner;
use crate::template::{TemplateBinding, TemplateError, UriTemplate, Variables};
use crate::uri;

/// What a relation resolved to.
#[derive(Debug, Clone)]
pub enum Relation {
    Resource(Node),
    List(TargetList),
    Template(Template),
}

impl Relation {
    /// The single resource. Lists are ambiguous and templates must be
    /// expanded first.
    pub fn into_resource(self) -> Result<Node, NavError> {
        match self {
            Relation::Resource(node) => Ok(node),
            Relation::List(list) => Err(list.ambiguous()),
            Relation::Template(template) => Err(template.unbound()),
        }
    }

    pub fn into_template(self) -> Result<Template, NavError> {
        match self {
            Relation::Template(template) => Ok(template),
            Relation::Resource(node) => Err(NavError::NotTemplated { uri: node.describe() }),
            Relation::List(list) => Err(list.ambiguous()),
        }
    }

    pub fn into_list(self) -> Option<TargetList> {
        match self {
            Relation::List(list) => Some(list),
            _ => None,
        }
    }

    pub fn as_resource(&self) -> Option<&Node> {
        match self {
            Relation::Resource(node) => Some(node),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&TargetList> {
        match self {
            Relation::List(list) => Some(list),
            _ => None,
        }
    }

    pub fn as_template(&self) -> Option<&Template> {
        match self {
            Relation::Template(template) => Some(template),
            _ => None,
        }
    }
}

impl From<Target> for Relation {
    fn from(target: Target) -> Self {
        match target {
            Target::Resource(node) => Relation::Resource(node),
            Target::Template(template) => Relation::Template(template),
        }
    }
}

/// One member of a multi-valued relation.
#[derive(Debug, Clone)]
pub enum Target {
    Resource(Node),
    Template(Template),
}

impl Target {
    pub fn into_resource(self) -> Result<Node, NavError> {
        Relation::from(self).into_resource()
    }

    pub fn as_resource(&self) -> Option<&Node> {
        match self {
            Target::Resource(node) => Some(node),
            Target::Template(_) => None,
        }
    }

    pub fn as_template(&self) -> Option<&Template> {
        match self {
            Target::Template(template) => Some(template),
            Target::Resource(_) => None,
        }
    }
}

/// A target and the link it was reached through. Embedded documents have no
/// link.
#[derive(Debug, Clone)]
pub struct TargetEntry {
    pub link: Option<Link>,
    pub target: Target,
}

impl TargetEntry {
    /// Match against the link's attributes, or against the state of an
    /// embedded resource.
    fn matches(&self, attr: &str, value: &Value) -> bool {
        match (&self.link, &self.target) {
            (Some(link), _) => link.matches(attr, value),
            (None, Target::Resource(node)) => node
                .cached_state()
                .and_then(|state| state.get(attr).map(|found| value_matches(found, value)))
                .unwrap_or(false),
            (None, Target::Template(_)) => false,
        }
    }
}

/// All targets of one relation, in source order.
#[derive(Debug, Clone)]
pub struct TargetList {
    rel: String,
    entries: Vec<TargetEntry>,
}

impl TargetList {
    pub(crate) fn from_links(
        rel: &str,
        links: &[Link],
        session: &Arc<SessionInner>,
        base: Option<&str>,
    ) -> Result<Self, NavError> {
        let entries = links
            .iter()
            .map(|link| {
                let target = if link.templated {
                    Target::Template(Template::from_link(link, session, base)?)
                } else {
                    let absolute = uri::resolve(base, &link.href)?;
                    Target::Resource(Node::canonical(session, &absolute))
                };
                Ok(TargetEntry {
                    link: Some(link.clone()),
                    target,
                })
            })
            .collect::<Result<Vec<_>, NavError>>()?;
        Ok(Self {
            rel: rel.to_string(),
            entries,
        })
    }

    pub(crate) fn from_embedded(rel: &str, nodes: &[Node]) -> Self {
        let entries = nodes
            .iter()
            .map(|node| TargetEntry {
                link: None,
                target: Target::Resource(node.clone()),
            })
            .collect();
        Self {
            rel: rel.to_string(),
            entries,
        }
    }

    /// One entry collapses to its target; more stay a list.
    pub(crate) fn collapse(mut self) -> Relation {
        if self.entries.len() == 1 {
            if let Some(entry) = self.entries.pop() {
                return entry.target.into();
            }
        }
        Relation::List(self)
    }

    /// The error for asking a list for its single resource.
    pub(crate) fn ambiguous(&self) -> NavError {
        if self.entries.is_empty() {
            return NavError::NoMatch {
                rel: self.rel.clone(),
                detail: "anything (the relation is empty)".into(),
            };
        }
        NavError::AmbiguousRelation {
            rel: self.rel.clone(),
            count: self.entries.len(),
        }
    }

    /// The relation key the targets were found under.
    pub fn rel(&self) -> &str {
        &self.rel
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Target> {
        self.entries.get(index).map(|e| &e.target)
    }

    pub fn entries(&self) -> &[TargetEntry] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &Target> {
        self.entries.iter().map(|e| &e.target)
    }

    /// The resources in the list, skipping templates.
    pub fn resources(&self) -> impl Iterator<Item = &Node> {
        self.iter().filter_map(Target::as_resource)
    }

    /// The first target whose attribute `attr` matches `value`.
    pub fn get_by(&self, attr: &str, value: impl Into<Value>) -> Option<&Target> {
        let value = value.into();
        self.entries
            .iter()
            .find(|e| e.matches(attr, &value))
            .map(|e| &e.target)
    }

    /// Every target whose attribute `attr` matches `value`, in source order.
    pub fn get_all_by(&self, attr: &str, value: impl Into<Value>) -> Vec<&Target> {
        let value = value.into();
        self.entries
            .iter()
            .filter(|e| e.matches(attr, &value))
            .map(|e| &e.target)
            .collect()
    }

    pub fn named(&self, name: &str) -> Option<&Target> {
        self.get_by("name", name)
    }
}

/// A templated link awaiting its variables.
///
/// Templates never enter the identity map; expanding one fully yields the
/// canonical node for the resulting URI. Templates that begin with an
/// expression (`{?q}`) are resolved against `base` once expanded.
#[derive(Clone)]
pub struct Template {
    link: Link,
    binding: TemplateBinding,
    base: Option<String>,
    session: Arc<SessionInner>,
}

impl Template {
    pub(crate) fn from_link(link: &Link, session: &Arc<SessionInner>, base: Option<&str>) -> Result<Self, NavError> {
        let resolved = uri::resolve_template(base, &link.href);
        let template = UriTemplate::parse(&resolved)?;
        Ok(Self {
            link: link.clone(),
            binding: TemplateBinding::new(template),
            base: base.map(str::to_string),
            session: Arc::clone(session),
        })
    }

    /// The template string, resolved against the containing resource.
    pub fn template_uri(&self) -> &str {
        self.binding.template().as_str()
    }

    /// The link this template came from.
    pub fn link(&self) -> &Link {
        &self.link
    }

    /// Declared variables in order of first appearance.
    pub fn variables(&self) -> Vec<&str> {
        self.binding.template().variables()
    }

    /// Declared variables as a set.
    pub fn parameters(&self) -> BTreeSet<String> {
        self.variables().into_iter().map(str::to_string).collect()
    }

    /// Declared variables not yet bound.
    pub fn remaining(&self) -> BTreeSet<String> {
        self.binding.remaining()
    }

    pub fn bound(&self) -> &Variables {
        self.binding.bound()
    }

    /// Bind some variables, keeping the result templated.
    pub fn bind(&self, vars: &Variables) -> Result<Template, NavError> {
        Ok(Self {
            link: self.link.clone(),
            binding: self.binding.bind(vars)?,
            base: self.base.clone(),
            session: Arc::clone(&self.session),
        })
    }

    /// The absolute URI for the bound variables plus `vars`; anything still
    /// unbound is dropped.
    pub fn expand_uri(&self, vars: &Variables) -> Result<String, NavError> {
        let expanded = self.binding.bind(vars)?.expand();
        Ok(uri::resolve(self.base.as_deref(), &expanded)?)
    }

    /// The source link with its href expanded and `templated` cleared.
    pub fn expand_link(&self, vars: &Variables) -> Result<Link, NavError> {
        let href = self.expand_uri(vars)?;
        let mut link = self.link.clone();
        link.attributes.insert("href".into(), Value::String(href.clone()));
        link.attributes.remove("templated");
        link.href = href;
        link.templated = false;
        Ok(link)
    }

    /// Bind `vars`. Once every declared variable is bound the result is the
    /// canonical node for the expanded URI; until then it is a template.
    pub fn expand(&self, vars: &Variables) -> Result<Relation, NavError> {
        let bound = self.bind(vars)?;
        if bound.binding.is_complete() {
            Ok(Relation::Resource(bound.complete()?))
        } else {
            Ok(Relation::Template(bound))
        }
    }

    /// Expand now, treating unbound variables as undefined.
    pub fn complete(&self) -> Result<Node, NavError> {
        let absolute = self.expand_uri(&Variables::new())?;
        Ok(Node::canonical(&self.session, &absolute))
    }

    pub(crate) fn unbound(&self) -> NavError {
        TemplateError::Unbound {
            template: self.template_uri().to_string(),
            missing: self.remaining().into_iter().collect(),
        }
        .into()
    }
}

impl fmt::Debug for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Template")
            .field("template", &self.template_uri())
            .field("bound", self.bound())
            .finish()
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Template({})", self.template_uri())
    }
}
