//! Event loop of the projection engine

use super::context::{strip_namespace, ElementContext};
use super::record::RecordTemplate;
use super::sink::RowSink;
use super::tag_spec::TagSpec;
use super::{ProjectionError, Result};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Enter,
    Exit,
}

/// Summary of one projection run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectionStats {
    /// Rows handed to the sink
    pub rows: usize,
    /// Enter and exit events processed
    pub events: u64,
    /// Whether the row cap stopped the scan early
    pub capped: bool,
    pub elapsed: Duration,
}

/// Projects an XML stream into rows according to a [`TagSpec`]
#[derive(Debug, Clone)]
pub struct Projector<'a> {
    spec: &'a TagSpec,
    max_rows: Option<usize>,
}

impl<'a> Projector<'a> {
    pub fn new(spec: &'a TagSpec) -> Self {
        Self {
            spec,
            max_rows: None,
        }
    }

    /// Stop after this many rows (`None` scans the whole document)
    pub fn with_max_rows(mut self, max_rows: Option<usize>) -> Self {
        self.max_rows = max_rows;
        self
    }

    /// Stream `source` and write one row per record boundary to `sink`
    pub fn project<R, S>(&self, source: R, sink: &mut S) -> Result<ProjectionStats>
    where
        R: BufRead,
        S: RowSink,
    {
        let started = Instant::now();
        let mut reader = Reader::from_reader(source);
        reader.config_mut().trim_text(false);

        let mut context = ElementContext::new();
        let mut records = RecordAccumulator::new(self.spec);
        // The innermost frame's enter event waits until its leading text is known
        let mut pending_enter = false;
        let mut capped = false;
        let mut buf = Vec::new();

        debug!(main_tags = ?records.main_tags, "Main tags to look for");

        loop {
            if let Some(max_rows) = self.max_rows {
                if records.rows >= max_rows {
                    info!(max_rows, "Max row count reached, stopping scan");
                    capped = true;
                    break;
                }
            }

            let event = reader.read_event_into(&mut buf).map_err(|source| ProjectionError::Xml {
                position: reader.buffer_position() as u64,
                source,
            })?;

            match event {
                Event::Start(start) => {
                    let tag = element_name(start.name().as_ref())?;
                    flush_enter(&mut pending_enter, &context, &mut records, sink)?;
                    context.push(tag);
                    pending_enter = true;
                },
                Event::Empty(start) => {
                    let tag = element_name(start.name().as_ref())?;
                    flush_enter(&mut pending_enter, &context, &mut records, sink)?;
                    context.push(tag);
                    pending_enter = true;
                    flush_enter(&mut pending_enter, &context, &mut records, sink)?;
                    exit_element(&mut context, &mut records, sink)?;
                },
                Event::End(_) => {
                    flush_enter(&mut pending_enter, &context, &mut records, sink)?;
                    exit_element(&mut context, &mut records, sink)?;
                },
                Event::Text(text) => {
                    let text = text.unescape().map_err(|source| ProjectionError::Xml {
                        position: reader.buffer_position() as u64,
                        source,
                    })?;
                    context.append_text(&text);
                },
                Event::CData(cdata) => {
                    let text = std::str::from_utf8(&cdata)
                        .map_err(|e| ProjectionError::Parse(format!("invalid UTF-8 in CDATA: {}", e)))?;
                    context.append_text(text);
                },
                Event::Eof => {
                    if let Some(open) = context.innermost() {
                        return Err(ProjectionError::Parse(format!(
                            "unexpected end of document inside <{}>",
                            open
                        )));
                    }
                    break;
                },
                // Declarations, comments, processing instructions, doctype
                _ => {},
            }

            buf.clear();
        }

        let stats = ProjectionStats {
            rows: records.rows,
            events: records.events,
            capped,
            elapsed: started.elapsed(),
        };

        info!(
            rows = stats.rows,
            events = stats.events,
            elapsed_secs = stats.elapsed.as_secs(),
            "Rows collected"
        );

        Ok(stats)
    }
}

/// Project an XML file on disk
pub fn project_file<S: RowSink>(
    path: &Path,
    spec: &TagSpec,
    sink: &mut S,
    max_rows: Option<usize>,
) -> Result<ProjectionStats> {
    info!(path = %path.display(), "Parsing XML started");

    let file = File::open(path)?;
    Projector::new(spec)
        .with_max_rows(max_rows)
        .project(BufReader::new(file), sink)
}

fn element_name(raw: &[u8]) -> Result<String> {
    let name = std::str::from_utf8(raw)
        .map_err(|e| ProjectionError::Parse(format!("invalid UTF-8 in tag name: {}", e)))?;
    Ok(strip_namespace(name).to_string())
}

fn flush_enter<S: RowSink>(
    pending: &mut bool,
    context: &ElementContext,
    records: &mut RecordAccumulator<'_>,
    sink: &mut S,
) -> Result<()> {
    if !std::mem::take(pending) {
        return Ok(());
    }
    match context.top() {
        Some(frame) => records.on_event(Phase::Enter, context, &frame.tag, &frame.text, sink),
        None => Ok(()),
    }
}

fn exit_element<S: RowSink>(
    context: &mut ElementContext,
    records: &mut RecordAccumulator<'_>,
    sink: &mut S,
) -> Result<()> {
    let frame = context
        .pop()
        .ok_or_else(|| ProjectionError::Parse("closing tag without matching open tag".to_string()))?;
    records.on_event(Phase::Exit, context, &frame.tag, &frame.text, sink)
    // `frame` and its text are released here
}

/// Per-run accumulation state
struct RecordAccumulator<'a> {
    spec: &'a TagSpec,
    main_tags: HashSet<&'a str>,
    record: RecordTemplate,
    boundary: Option<String>,
    rows: usize,
    events: u64,
}

impl<'a> RecordAccumulator<'a> {
    fn new(spec: &'a TagSpec) -> Self {
        Self {
            spec,
            main_tags: spec.main_tags(),
            record: spec.template(),
            boundary: None,
            rows: 0,
            events: 0,
        }
    }

    /// Handle one enter/exit event
    ///
    /// On enter, `context` already contains the element; on exit it has
    /// already been popped.
    fn on_event<S: RowSink>(
        &mut self,
        phase: Phase,
        context: &ElementContext,
        tag: &str,
        text: &str,
        sink: &mut S,
    ) -> Result<()> {
        self.events += 1;
        self.capture(phase, context, tag, text);

        if self.boundary.is_none() && self.main_tags.contains(tag) {
            self.boundary = context.innermost().map(str::to_string);
            debug!(boundary = ?self.boundary, "Record boundary fixed");
        }

        if phase == Phase::Exit && self.boundary.as_deref() == Some(tag) {
            let row = self.record.take_row();
            debug!(values = ?row.values(), "Row collected");
            sink.write_row(row)
                .map_err(|e| ProjectionError::Sink(Box::new(e)))?;
            self.rows += 1;
        }

        Ok(())
    }

    /// Store `text` under the first matching key; blank text never overwrites
    fn capture(&mut self, phase: Phase, context: &ElementContext, tag: &str, text: &str) {
        if text.trim().is_empty() {
            return;
        }

        if let Some(column) = self.spec.bare_column(tag) {
            self.record.set(column, text);
            return;
        }

        if context.depth() > 1 {
            if let Some(column) = context
                .ancestor(1)
                .and_then(|parent| self.spec.compound_column(parent, tag))
            {
                self.record.set(column, text);
                return;
            }
        }

        if phase == Phase::Exit {
            if let Some(column) = context
                .innermost()
                .and_then(|parent| self.spec.compound_column(parent, tag))
            {
                self.record.set(column, text);
            }
        }
    }
}
