//! Streaming parser for Windows-style XML event logs.

use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::{Result, SupportError};
use crate::logs::read_log;
use crate::report::Finding;

/// The parts of an `<Event>` element the crash scan looks at.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventRecord {
    pub event_id: Option<String>,
    pub provider: Option<String>,
    pub time_created: Option<String>,
    pub data: Vec<String>,
}

struct OpenEvent {
    /// Index of the `Event` element in the element stack.
    depth: usize,
    seq: usize,
    record: EventRecord,
}

pub fn scan_event_log(path: &Path, keywords: &[String]) -> Result<Vec<Finding>> {
    let xml = read_log(path)?;
    let records = parse_events(&xml)?;
    tracing::debug!(events = records.len(), path = %path.display(), "parsed event log");
    Ok(crash_findings(&records, keywords))
}

/// Collects every `Event` element, at any depth, in document order.
pub fn parse_events(xml: &str) -> Result<Vec<EventRecord>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<String> = Vec::new();
    let mut open: Vec<OpenEvent> = Vec::new();
    let mut done: Vec<(usize, EventRecord)> = Vec::new();
    let mut text = String::new();
    let mut seq = 0;
    let mut roots = 0;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = local_name(&e);
                enter_element(&stack, &name, &mut roots)?;
                text.clear();
                if name == "Event" {
                    open.push(OpenEvent {
                        depth: stack.len(),
                        seq,
                        record: EventRecord::default(),
                    });
                    seq += 1;
                }
                stack.push(name);
                if let Some(current) = open.last_mut() {
                    read_attributes(&e, relative(&stack, current.depth), &mut current.record)?;
                }
            }
            Ok(Event::Empty(e)) => {
                let name = local_name(&e);
                enter_element(&stack, &name, &mut roots)?;
                if name == "Event" {
                    done.push((seq, EventRecord::default()));
                    seq += 1;
                    continue;
                }
                stack.push(name);
                if let Some(current) = open.last_mut() {
                    read_attributes(&e, relative(&stack, current.depth), &mut current.record)?;
                }
                stack.pop();
            }
            Ok(Event::Text(t)) => {
                let value = t
                    .unescape()
                    .map_err(|e| SupportError::MalformedXml(e.to_string()))?;
                outside_root_text(&stack, &value)?;
                text.push_str(&value);
            }
            Ok(Event::CData(c)) => {
                let value = String::from_utf8_lossy(&c);
                outside_root_text(&stack, &value)?;
                text.push_str(&value);
            }
            Ok(Event::End(_)) => {
                if let Some(current) = open.last_mut() {
                    let value = text.trim();
                    match relative(&stack, current.depth) {
                        [system, id] if system == "System" && id == "EventID" => {
                            current.record.event_id = Some(value.to_string());
                        }
                        [data_group, data] if data_group == "EventData" && data == "Data" => {
                            // Multi-line data is folded onto one line for the reports.
                            let folded = value.split_whitespace().collect::<Vec<_>>().join(" ");
                            current.record.data.push(folded);
                        }
                        _ => {}
                    }
                    if current.depth + 1 == stack.len() {
                        if let Some(closed) = open.pop() {
                            done.push((closed.seq, closed.record));
                        }
                    }
                }
                stack.pop();
                text.clear();
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(SupportError::MalformedXml(e.to_string())),
        }
    }

    if let Some(unclosed) = stack.last() {
        return Err(SupportError::MalformedXml(format!(
            "unexpected end of document inside <{unclosed}>"
        )));
    }

    if roots == 0 && !is_blank(xml) {
        return Err(SupportError::MalformedXml(
            "no root element in document".to_string(),
        ));
    }

    done.sort_by_key(|(seq, _)| *seq);
    Ok(done.into_iter().map(|(_, record)| record).collect())
}

/// One `application_crash` finding per event whose data mentions a keyword.
pub fn crash_findings(records: &[EventRecord], keywords: &[String]) -> Vec<Finding> {
    let keywords: Vec<String> = keywords
        .iter()
        .filter(|k| !k.is_empty())
        .map(|k| k.to_lowercase())
        .collect();
    if keywords.is_empty() {
        return Vec::new();
    }
    records
        .iter()
        .filter_map(|record| {
            let description = record.data.iter().find(|data| {
                let lowered = data.to_lowercase();
                keywords.iter().any(|k| lowered.contains(k.as_str()))
            })?;
            Some(Finding::ApplicationCrash {
                event_id: record.event_id.clone(),
                provider: record.provider.clone(),
                time_created: record.time_created.clone(),
                description: description.clone(),
            })
        })
        .collect()
}

/// Counts top-level elements; a document has exactly one root.
fn enter_element(stack: &[String], name: &str, roots: &mut usize) -> Result<()> {
    if stack.is_empty() {
        if *roots > 0 {
            return Err(SupportError::MalformedXml(format!(
                "second root element <{name}>"
            )));
        }
        *roots += 1;
    }
    Ok(())
}

fn outside_root_text(stack: &[String], value: &str) -> Result<()> {
    if stack.is_empty() && !is_blank(value) {
        return Err(SupportError::MalformedXml(
            "text outside the root element".to_string(),
        ));
    }
    Ok(())
}

fn is_blank(text: &str) -> bool {
    text.trim_matches(|c: char| c.is_whitespace() || c == '\u{feff}')
        .is_empty()
}

fn local_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}

/// Element path below the enclosing `Event`, e.g. `["System", "EventID"]`.
fn relative(stack: &[String], event_depth: usize) -> &[String] {
    stack.get(event_depth + 1..).unwrap_or(&[])
}

fn read_attributes(e: &BytesStart<'_>, path: &[String], record: &mut EventRecord) -> Result<()> {
    let (target, wanted) = match path {
        [system, tag] if system == "System" && tag == "Provider" => (&mut record.provider, "Name"),
        [system, tag] if system == "System" && tag == "TimeCreated" => {
            (&mut record.time_created, "SystemTime")
        }
        _ => return Ok(()),
    };
    for attr in e.attributes() {
        let attr = attr.map_err(|e| SupportError::MalformedXml(e.to_string()))?;
        if attr.key.local_name().as_ref() == wanted.as_bytes() {
            let value = attr
                .unescape_value()
                .map_err(|e| SupportError::MalformedXml(e.to_string()))?;
            *target = Some(value.into_owned());
        }
    }
    Ok(())
}
