//! OAI-PMH `ListRecords` responses with `oai_dc` metadata.
use engine_logging::{engine_debug, engine_warn};
use harvester_core::Record;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::decode::decode_payload;
use crate::extract::non_blank;
use crate::{Extraction, Extractor, Payload};

/// OAI error code that only means "empty result set".
const NO_RECORDS_MATCH: &str = "noRecordsMatch";

#[derive(Debug, Default, Clone, Copy)]
pub struct OaiPmhExtractor;

impl Extractor for OaiPmhExtractor {
    fn extract(&self, payload: &Payload) -> Extraction {
        let parsed = decode_payload(payload)
            .map_err(|err| err.to_string())
            .and_then(|decoded| parse_list_records(&decoded.text));
        match parsed {
            Ok(extraction) => {
                engine_debug!(
                    "Extracted {} OAI record(s), continuation: {}",
                    extraction.records.len(),
                    extraction.continuation.is_some()
                );
                extraction
            }
            Err(message) => {
                engine_warn!("OAI-PMH response could not be parsed: {}", message);
                Extraction::failed(message)
            }
        }
    }
}

#[derive(Default)]
struct ListRecordsParser {
    /// Local names of the open elements.
    path: Vec<String>,
    text: String,
    current: Option<Record>,
    records: Vec<Record>,
    continuation: Option<String>,
    complete_list_size: Option<u64>,
    error: Option<String>,
    saw_root: bool,
}

impl ListRecordsParser {
    fn open(&mut self, element: &BytesStart) -> Result<String, String> {
        let name = local_name(element);
        match name.as_str() {
            "OAI-PMH" => self.saw_root = true,
            "record" => self.current = Some(Record::new()),
            "header" => {
                if let (Some(record), Some(status)) =
                    (self.current.as_mut(), attribute(element, "status")?)
                {
                    record.push("status", Some(status));
                }
            }
            "resumptionToken" => {
                self.complete_list_size = attribute(element, "completeListSize")?
                    .and_then(|size| size.trim().parse().ok());
            }
            "error" => {
                let code = attribute(element, "code")?.unwrap_or_default();
                self.error = Some(code);
            }
            _ => {}
        }
        self.text.clear();
        Ok(name)
    }

    fn close(&mut self, name: &str) {
        let text = std::mem::take(&mut self.text);
        let parent = self.path.last().map(String::as_str);
        match (name, parent) {
            ("record", _) => {
                if let Some(record) = self.current.take() {
                    self.records.push(record);
                }
            }
            ("identifier" | "datestamp" | "setSpec", Some("header")) => {
                if let Some(record) = self.current.as_mut() {
                    record.push(name, non_blank(&text));
                }
            }
            (field, Some("dc")) => {
                if let Some(record) = self.current.as_mut() {
                    record.push(field, non_blank(&text));
                }
            }
            ("resumptionToken", _) => self.continuation = non_blank(&text),
            ("error", _) => {
                if let Some(code) = self.error.as_mut() {
                    if !text.trim().is_empty() {
                        code.push_str(": ");
                        code.push_str(text.trim());
                    }
                }
            }
            _ => {}
        }
    }

    fn finish(self) -> Result<Extraction, String> {
        if !self.path.is_empty() {
            return Err(format!("unexpected end of document inside <{}>", self.path.join("/")));
        }
        if !self.saw_root {
            return Err("missing OAI-PMH root element".to_string());
        }
        let parse_error = self
            .error
            .filter(|error| !error.starts_with(NO_RECORDS_MATCH))
            .map(|error| format!("OAI error {error}"));
        if let Some(error) = parse_error.as_deref() {
            engine_warn!("Source reported {}", error);
        }
        Ok(Extraction {
            records: self.records,
            continuation: self.continuation,
            parse_error,
            complete_list_size: self.complete_list_size,
        })
    }
}

/// Event-driven walk over a `ListRecords` document. Any XML error fails the whole batch.
fn parse_list_records(xml: &str) -> Result<Extraction, String> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut parser = ListRecordsParser::default();

    loop {
        let event = reader
            .read_event()
            .map_err(|err| format!("xml error at byte {}: {err}", reader.error_position()))?;
        match event {
            Event::Start(element) => {
                let name = parser.open(&element)?;
                parser.path.push(name);
            }
            Event::Empty(element) => {
                let name = parser.open(&element)?;
                parser.close(&name);
            }
            Event::End(_) => {
                if let Some(name) = parser.path.pop() {
                    parser.close(&name);
                }
            }
            Event::Text(text) => {
                let text = text.unescape().map_err(|err| err.to_string())?;
                parser.text.push_str(&text);
            }
            Event::CData(data) => {
                parser.text.push_str(&String::from_utf8_lossy(&data.into_inner()));
            }
            Event::Eof => break,
            _ => {}
        }
    }

    parser.finish()
}

fn local_name(element: &BytesStart) -> String {
    String::from_utf8_lossy(element.local_name().as_ref()).into_owned()
}

fn attribute(element: &BytesStart, name: &str) -> Result<Option<String>, String> {
    let attr = element
        .try_get_attribute(name)
        .map_err(|err| err.to_string())?;
    attr.map(|attr| {
        attr.unescape_value()
            .map(|value| value.into_owned())
            .map_err(|err| err.to_string())
    })
    .transpose()
}
