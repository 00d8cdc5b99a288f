//! Search-result listing pages (HTML).
//!
//! Field mapping, in precedence order within each field:
//! - `id`: digits after `/1887/` in the first handle link
//! - `title`: the title `dd` link text
//! - `author`, `year`: the name `dd`, minus its trailing year span and `;`
//! - `resource_type`, `availability`: genre `dd` (the embargo variant for availability)
//! - `abstract`: last span of the toggle wrapper (`<br>` kept as newlines), else the
//!   abstract `dd` text unless it only carries an embargo notice
use ego_tree::NodeRef;
use engine_logging::{engine_debug, engine_warn};
use harvester_core::{FieldValue, Record};
use scraper::node::Node;
use scraper::{ElementRef, Html, Selector};

use crate::decode::decode_payload;
use crate::{Extraction, Extractor, PageScope, Payload, ScopeProbe};

const HANDLE_PREFIX: &str = "/1887/";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("invalid selector `{selector}`: {message}")]
pub struct SelectorError {
    pub selector: String,
    pub message: String,
}

fn compile(selector: &str) -> Result<Selector, SelectorError> {
    Selector::parse(selector).map_err(|err| SelectorError {
        selector: selector.to_string(),
        message: err.to_string(),
    })
}

#[derive(Debug)]
pub struct SearchResultsExtractor {
    row: Selector,
    handle_link: Selector,
    title: Selector,
    author: Selector,
    year: Selector,
    resource_type: Selector,
    availability: Selector,
    abstract_wrapper: Selector,
    abstract_dd: Selector,
    embargo: Selector,
    pager_link: Selector,
}

impl SearchResultsExtractor {
    pub fn new() -> Result<Self, SelectorError> {
        Ok(Self {
            row: compile("div.ubl-resultrow.islandora-solr-search-result")?,
            handle_link: compile(r#"a[href^="/handle/1887/"]"#)?,
            title: compile("dd.mods-titleinfo-title-custom-ms a")?,
            author: compile("dd.mods-name-authorrole-namepart-custom-ms")?,
            year: compile(
                "span.mods-origininfo-encoding-w3cdtf-keyDate-yes-dateIssued-year-custom-ms",
            )?,
            resource_type: compile("dd.mods-genre-authority-local-ms")?,
            availability: compile("dd.mods-genre-authority-local-ms.ubl-embargo")?,
            abstract_wrapper: compile("dd.mods-abstract-ms span.toggle-wrapper")?,
            abstract_dd: compile("dd.mods-abstract-ms")?,
            embargo: compile(".ubl-embargo")?,
            pager_link: compile("ul.pager li a")?,
        })
    }

    fn record(&self, row: ElementRef) -> Record {
        let mut record = Record::new();

        let id = row
            .select(&self.handle_link)
            .next()
            .and_then(|link| link.value().attr("href"))
            .and_then(handle_id);
        record.insert("id", FieldValue::from_option(id));

        let title = first_text(row, &self.title);
        record.insert("title", FieldValue::from_option(title));

        let (author, year) = match row.select(&self.author).next() {
            Some(dd) => split_author_year(dd, &self.year),
            None => (None, None),
        };
        record.insert("author", FieldValue::from_option(author));
        record.insert("year", FieldValue::from_option(year));

        let resource_type = first_text(row, &self.resource_type);
        record.insert("resource_type", FieldValue::from_option(resource_type));
        let availability = first_text(row, &self.availability);
        record.insert("availability", FieldValue::from_option(availability));

        record.insert("abstract", FieldValue::from_option(self.abstract_text(row)));
        record
    }

    fn abstract_text(&self, row: ElementRef) -> Option<String> {
        let from_wrapper = row.select(&self.abstract_wrapper).next().and_then(|wrapper| {
            wrapper
                .children()
                .rev()
                .filter_map(ElementRef::wrap)
                .find(|child| child.value().name() == "span")
                .map(|span| text_with_breaks(*span))
        });
        if from_wrapper.is_some() {
            return from_wrapper.filter(|text| !text.is_empty());
        }

        let dd = row.select(&self.abstract_dd).next()?;
        if dd.select(&self.embargo).next().is_some() {
            return None;
        }
        non_empty(element_text(dd))
    }
}

impl Extractor for SearchResultsExtractor {
    fn extract(&self, payload: &Payload) -> Extraction {
        let decoded = match decode_payload(payload) {
            Ok(decoded) => decoded,
            Err(err) => {
                engine_warn!("Search page could not be decoded: {}", err);
                return Extraction::failed(err.to_string());
            }
        };
        let doc = Html::parse_document(&decoded.text);
        let records: Vec<Record> = doc.select(&self.row).map(|row| self.record(row)).collect();
        engine_debug!("Extracted {} search result(s)", records.len());
        Extraction {
            records,
            ..Extraction::default()
        }
    }
}

impl ScopeProbe for SearchResultsExtractor {
    fn probe(&self, first_page: &Payload) -> PageScope {
        let Ok(decoded) = decode_payload(first_page) else {
            engine_warn!("First page could not be decoded; assuming a single page");
            return PageScope {
                total_pages: 1,
                has_results: false,
            };
        };
        let doc = Html::parse_document(&decoded.text);
        let has_results = doc.select(&self.row).next().is_some();
        let max_page = doc
            .select(&self.pager_link)
            .filter_map(|link| link.value().attr("href"))
            .filter_map(page_param)
            .max();
        PageScope {
            total_pages: max_page.unwrap_or(1).max(1),
            has_results,
        }
    }
}

fn handle_id(href: &str) -> Option<String> {
    let start = href.find(HANDLE_PREFIX)? + HANDLE_PREFIX.len();
    let digits: String = href[start..]
        .chars()
        .take_while(char::is_ascii_digit)
        .collect();
    non_empty(digits)
}

fn page_param(href: &str) -> Option<u32> {
    let (_, query) = href.split_once('?')?;
    let query = query.split('#').next().unwrap_or(query);
    query
        .split('&')
        .filter_map(|pair| pair.strip_prefix("page="))
        .filter_map(|value| value.parse::<u32>().ok())
        .max()
}

/// The name `dd` holds "Author A; Author B 2021"; the year sits in its own span.
fn split_author_year(dd: ElementRef, year_sel: &Selector) -> (Option<String>, Option<String>) {
    let full = element_text(dd);
    let year = dd.select(year_sel).next().map(element_text).and_then(non_empty);
    let author = match year.as_deref() {
        Some(year) => {
            let without_year = full.strip_suffix(year).unwrap_or(&full).trim_end();
            without_year.strip_suffix(';').unwrap_or(without_year).trim().to_string()
        }
        None => full,
    };
    (non_empty(author), year)
}

fn text_with_breaks(node: NodeRef<'_, Node>) -> String {
    let mut out = String::new();
    for child in node.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text.trim()),
            Node::Element(element) if element.name() == "br" => out.push('\n'),
            _ => {}
        }
    }
    out.trim().to_string()
}

fn first_text(scope: ElementRef, selector: &Selector) -> Option<String> {
    scope
        .select(selector)
        .next()
        .map(element_text)
        .and_then(non_empty)
}

fn element_text(element: ElementRef) -> String {
    element.text().collect::<String>().trim().to_string()
}

fn non_empty(value: String) -> Option<String> {
    (!value.is_empty()).then_some(value)
}
