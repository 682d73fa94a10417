//! Extraction hooks
//!
//! An [`Extractor`] owns everything site-specific: how a target becomes an
//! address, how a parsed document becomes a record, and optionally how the
//! policy table is bent for that site. [`SelectorExtractor`] is the
//! configuration-driven implementation used by the CLI.

use crate::config::{ExtractConfig, FieldConfig};
use crate::crawler::classify::{default_policy, Action, CrawlFailure, FailureKind};
use crate::state::CrawlTarget;
use crate::DriftnetError;
use scraper::{Html, Selector};
use serde_json::Value;
use std::time::Duration;

/// A structured result, serialized as a JSON object when published
pub type Record = serde_json::Map<String, Value>;

/// Site-specific hooks called by the crawl session
pub trait Extractor: Send + Sync {
    /// Name used to build the engine name in logs
    fn name(&self) -> &str;

    /// Turns a target into the address to fetch
    fn resolve_address(&self, target: &CrawlTarget) -> Result<String, CrawlFailure>;

    /// Turns a parsed document into a record
    ///
    /// Return `CrawlFailure::no_content()` when the document holds nothing
    /// yet, and `CrawlFailure::non_indexable(..)` when it holds something
    /// that must not be published.
    fn extract(&self, target: &CrawlTarget, document: &Html) -> Result<Record, CrawlFailure>;

    /// Returns extra fields merged into the record before publishing
    ///
    /// Errors here are bugs in the extraction pipeline and stop the engine.
    fn enrich(&self, _record: &Record) -> anyhow::Result<Record> {
        Ok(Record::new())
    }

    /// Pause after a published target, honored in calm mode only
    fn delay_after(&self, _target: &CrawlTarget) -> Option<Duration> {
        None
    }

    /// Action for a failure kind; override to change the policy table
    fn policy(&self, kind: &FailureKind) -> Action {
        default_policy(kind)
    }

    /// Extra context attached to fatal diagnostics
    fn crash_info(&self) -> Record {
        Record::new()
    }
}

struct CompiledField {
    name: String,
    selector: Selector,
    attribute: Option<String>,
    multiple: bool,
}

/// Extractor driven by CSS selectors from the `[extract]` config section
pub struct SelectorExtractor {
    name: String,
    url_template: Option<String>,
    fields: Vec<CompiledField>,
    required: Vec<String>,
    skip_if: Option<Selector>,
    delay: Option<Duration>,
}

fn compile(selector: &str) -> Result<Selector, DriftnetError> {
    Selector::parse(selector).map_err(|e| DriftnetError::Selector {
        selector: selector.to_string(),
        message: format!("{:?}", e),
    })
}

impl SelectorExtractor {
    /// Compiles every selector of the extraction config
    pub fn new(config: &ExtractConfig) -> Result<Self, DriftnetError> {
        let fields = config
            .fields
            .iter()
            .map(|(name, field)| compile_field(name, field))
            .collect::<Result<Vec<_>, _>>()?;

        let skip_if = config.skip_if.as_deref().map(compile).transpose()?;

        Ok(Self {
            name: config.name.clone(),
            url_template: config.url_template.clone(),
            fields,
            required: config.required.clone(),
            skip_if,
            delay: config.delay_ms.filter(|ms| *ms > 0).map(Duration::from_millis),
        })
    }

    fn field_value(field: &CompiledField, document: &Html) -> Option<Value> {
        let mut values = document.select(&field.selector).filter_map(|element| {
            let value = match &field.attribute {
                Some(attr) => element.value().attr(attr).map(str::to_string),
                None => Some(element.text().collect::<String>()),
            }?;
            let value = value.trim().to_string();
            (!value.is_empty()).then_some(value)
        });

        if field.multiple {
            let all: Vec<Value> = values.map(Value::String).collect();
            (!all.is_empty()).then_some(Value::Array(all))
        } else {
            values.next().map(Value::String)
        }
    }
}

fn compile_field(name: &str, field: &FieldConfig) -> Result<CompiledField, DriftnetError> {
    Ok(CompiledField {
        name: name.to_string(),
        selector: compile(&field.selector)?,
        attribute: field.attribute.clone(),
        multiple: field.multiple,
    })
}

impl Extractor for SelectorExtractor {
    fn name(&self) -> &str {
        &self.name
    }

    fn resolve_address(&self, target: &CrawlTarget) -> Result<String, CrawlFailure> {
        match target {
            CrawlTarget::Url(url) => Ok(url.clone()),
            CrawlTarget::Id(id) => self
                .url_template
                .as_ref()
                .map(|template| template.replace("{id}", &id.to_string()))
                .ok_or_else(|| CrawlFailure::unclassified("no url-template configured for cursor targets")),
        }
    }

    fn extract(&self, target: &CrawlTarget, document: &Html) -> Result<Record, CrawlFailure> {
        if let Some(skip) = &self.skip_if {
            if document.select(skip).next().is_some() {
                return Err(CrawlFailure::non_indexable(format!(
                    "{} matched the skip selector",
                    target
                )));
            }
        }

        let mut record = Record::new();
        for field in &self.fields {
            if let Some(value) = Self::field_value(field, document) {
                record.insert(field.name.clone(), value);
            }
        }

        let missing_required = self.required.iter().any(|name| !record.contains_key(name));
        if record.is_empty() || missing_required {
            return Err(CrawlFailure::no_content());
        }

        record.insert(
            "target".to_string(),
            serde_json::to_value(target).map_err(CrawlFailure::unclassified)?,
        );
        Ok(record)
    }

    fn delay_after(&self, _target: &CrawlTarget) -> Option<Duration> {
        self.delay
    }
}
