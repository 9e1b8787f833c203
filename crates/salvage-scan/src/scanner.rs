//! Incremental tokenizer over an append-only model-output stream.
//!
//! [`StreamScanner`] finds artifact block boundaries and the verbatim file
//! sections inside them. It never assumes a chunk boundary aligns with a
//! token boundary: multi-character markers are matched across chunk joins by
//! retaining an unconsumed tail of the buffer between `feed` calls. Scanning
//! is amortized linear — consumed input is dropped, never re-scanned.

use serde::{Deserialize, Serialize};

use crate::tag::{self, BlockHeader};

const ARTIFACT_OPEN: &str = "<artifact";
const ARTIFACT_CLOSE: &str = "</artifact";
const FILE_OPEN: &str = "<file";
const FILE_CLOSE: &str = "</file>";

/// Events emitted by the scanner, in stream order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ScanEvent {
    /// The open tag's attributes parsed — emitted before the body completes.
    BlockOpened { header: BlockHeader },
    FileStarted { path: String },
    /// Newly-scanned verbatim text. Emitted opportunistically as content
    /// accumulates so consumers can render an optimistic preview.
    FileChunk { path: String, text: String },
    FileClosed { path: String },
    BlockClosed { identifier: String },
    /// Text outside any block. Feeds the bare-fence fallback detector.
    Prose { text: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TagTarget {
    Artifact,
    File,
}

impl TagTarget {
    fn marker(self) -> &'static str {
        match self {
            TagTarget::Artifact => ARTIFACT_OPEN,
            TagTarget::File => FILE_OPEN,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanPhase {
    Scanning,
    InOpenTag { target: TagTarget },
    InBody,
    InVerbatim,
    InCloseTag,
}

/// Length of the longest suffix of `haystack` that is a proper prefix of
/// `marker`. That suffix must be retained in the buffer — the rest of the
/// marker may arrive in the next chunk.
fn partial_marker_len(haystack: &str, marker: &str) -> usize {
    let max = (marker.len() - 1).min(haystack.len());
    for k in (1..=max).rev() {
        let start = haystack.len() - k;
        if !haystack.is_char_boundary(start) {
            continue;
        }
        if marker.as_bytes()[..k] == haystack.as_bytes()[start..] {
            return k;
        }
    }
    0
}

/// Incremental scanner with exclusive, per-stream state.
///
/// One scanner owns the scan state for exactly one message stream. Call
/// [`reset`](StreamScanner::reset) (or build a fresh scanner) before feeding
/// a new message.
#[derive(Debug)]
pub struct StreamScanner {
    /// Unconsumed tail, retained between `feed` calls.
    buf: String,
    phase: ScanPhase,
    /// Raw tag text accumulated while in an open tag.
    tag_buf: String,
    /// Open quote character inside a tag, if any.
    quote: Option<char>,
    escaped: bool,
    /// Identifier of the currently open block.
    block: Option<String>,
    /// Path of the currently open verbatim section.
    file: Option<String>,
}

impl StreamScanner {
    pub fn new() -> Self {
        Self {
            buf: String::new(),
            phase: ScanPhase::Scanning,
            tag_buf: String::new(),
            quote: None,
            escaped: false,
            block: None,
            file: None,
        }
    }

    /// Discard all scan state. Equivalent to replacing the scanner.
    pub fn reset(&mut self) {
        *self = StreamScanner::new();
    }

    /// `true` while the scanner is inside an unclosed block.
    pub fn in_block(&self) -> bool {
        matches!(
            self.phase,
            ScanPhase::InBody
                | ScanPhase::InVerbatim
                | ScanPhase::InCloseTag
                | ScanPhase::InOpenTag {
                    target: TagTarget::File
                }
        )
    }

    /// Feed the next chunk of the stream and collect the events it produces.
    pub fn feed(&mut self, chunk: &str) -> Vec<ScanEvent> {
        let mut events = Vec::new();
        self.buf.push_str(chunk);
        self.drain(&mut events);
        events
    }

    /// Signal that the stream is complete. Flushes trailing prose and any
    /// verbatim tail. A block still open at this point never emits
    /// `BlockClosed` — the assembler treats it as incomplete, not an error.
    pub fn finish(&mut self) -> Vec<ScanEvent> {
        let mut events = Vec::new();
        self.drain(&mut events);
        match self.phase {
            ScanPhase::Scanning => {
                if !self.buf.is_empty() {
                    events.push(ScanEvent::Prose {
                        text: std::mem::take(&mut self.buf),
                    });
                }
            }
            ScanPhase::InOpenTag {
                target: TagTarget::Artifact,
            } => {
                // The open tag never completed; its text is prose.
                if !self.tag_buf.is_empty() {
                    events.push(ScanEvent::Prose {
                        text: std::mem::take(&mut self.tag_buf),
                    });
                }
            }
            ScanPhase::InVerbatim => {
                if !self.buf.is_empty() {
                    events.push(ScanEvent::FileChunk {
                        path: self.file.clone().unwrap_or_default(),
                        text: std::mem::take(&mut self.buf),
                    });
                }
                tracing::debug!(block = ?self.block, "stream ended inside a verbatim section");
            }
            _ => {
                tracing::debug!(block = ?self.block, "stream ended inside an artifact block");
            }
        }
        self.reset();
        events
    }

    fn drain(&mut self, events: &mut Vec<ScanEvent>) {
        let buf = std::mem::take(&mut self.buf);
        let mut pos = 0;

        'outer: loop {
            match self.phase {
                ScanPhase::Scanning => match buf[pos..].find(ARTIFACT_OPEN) {
                    Some(i) => {
                        if i > 0 {
                            events.push(ScanEvent::Prose {
                                text: buf[pos..pos + i].to_string(),
                            });
                        }
                        pos += i + ARTIFACT_OPEN.len();
                        self.begin_tag(TagTarget::Artifact);
                    }
                    None => {
                        let keep = partial_marker_len(&buf[pos..], ARTIFACT_OPEN);
                        let cut = buf.len() - keep;
                        if cut > pos {
                            events.push(ScanEvent::Prose {
                                text: buf[pos..cut].to_string(),
                            });
                        }
                        pos = cut;
                        break 'outer;
                    }
                },

                ScanPhase::InOpenTag { target } => {
                    let marker = target.marker();
                    let mut closed = false;
                    while let Some(c) = buf[pos..].chars().next() {
                        // The first character after the marker decides whether
                        // this is really a tag: "<artifacts" is prose.
                        if self.tag_buf.len() == marker.len() && !(c.is_whitespace() || c == '>')
                        {
                            match target {
                                TagTarget::Artifact => {
                                    events.push(ScanEvent::Prose {
                                        text: std::mem::take(&mut self.tag_buf),
                                    });
                                    self.phase = ScanPhase::Scanning;
                                }
                                TagTarget::File => {
                                    self.tag_buf.clear();
                                    self.phase = ScanPhase::InBody;
                                }
                            }
                            continue 'outer;
                        }
                        pos += c.len_utf8();
                        self.tag_buf.push(c);
                        if self.escaped {
                            self.escaped = false;
                        } else if let Some(q) = self.quote {
                            if c == '\\' {
                                self.escaped = true;
                            } else if c == q {
                                self.quote = None;
                            }
                        } else if c == '"' || c == '\'' {
                            self.quote = Some(c);
                        } else if c == '>' {
                            closed = true;
                            break;
                        }
                    }
                    if !closed {
                        break 'outer;
                    }
                    let tag_text = std::mem::take(&mut self.tag_buf);
                    match target {
                        TagTarget::Artifact => match tag::parse_artifact_tag(&tag_text) {
                            Ok(header) => {
                                self.block = Some(header.identifier.clone());
                                events.push(ScanEvent::BlockOpened { header });
                                self.phase = ScanPhase::InBody;
                            }
                            Err(err) => {
                                tracing::debug!(error = %err, "malformed artifact tag, treating as prose");
                                events.push(ScanEvent::Prose { text: tag_text });
                                self.phase = ScanPhase::Scanning;
                            }
                        },
                        TagTarget::File => match tag::parse_file_tag(&tag_text) {
                            Ok(path) => {
                                self.file = Some(path.clone());
                                events.push(ScanEvent::FileStarted { path });
                                self.phase = ScanPhase::InVerbatim;
                            }
                            Err(err) => {
                                tracing::debug!(error = %err, "malformed file tag inside block, skipped");
                                self.phase = ScanPhase::InBody;
                            }
                        },
                    }
                }

                ScanPhase::InBody => {
                    let rest = &buf[pos..];
                    let file_at = rest.find(FILE_OPEN);
                    let close_at = rest.find(ARTIFACT_CLOSE);
                    match (file_at, close_at) {
                        (Some(f), None) => {
                            pos += f + FILE_OPEN.len();
                            self.begin_tag(TagTarget::File);
                        }
                        (Some(f), Some(cl)) if f < cl => {
                            pos += f + FILE_OPEN.len();
                            self.begin_tag(TagTarget::File);
                        }
                        (_, Some(cl)) => {
                            pos += cl + ARTIFACT_CLOSE.len();
                            self.phase = ScanPhase::InCloseTag;
                        }
                        (None, None) => {
                            let keep = partial_marker_len(rest, FILE_OPEN)
                                .max(partial_marker_len(rest, ARTIFACT_CLOSE));
                            pos = buf.len() - keep;
                            break 'outer;
                        }
                    }
                }

                ScanPhase::InCloseTag => {
                    let mut resolved = false;
                    while let Some(c) = buf[pos..].chars().next() {
                        if c == '>' {
                            pos += 1;
                            let identifier = self.block.take().unwrap_or_default();
                            self.file = None;
                            events.push(ScanEvent::BlockClosed { identifier });
                            self.phase = ScanPhase::Scanning;
                            resolved = true;
                            break;
                        } else if c.is_whitespace() {
                            pos += c.len_utf8();
                        } else {
                            // "</artifactual" — not a close marker after all.
                            self.phase = ScanPhase::InBody;
                            resolved = true;
                            break;
                        }
                    }
                    if !resolved {
                        break 'outer;
                    }
                }

                ScanPhase::InVerbatim => {
                    let path = self.file.clone().unwrap_or_default();
                    match buf[pos..].find(FILE_CLOSE) {
                        Some(i) => {
                            if i > 0 {
                                events.push(ScanEvent::FileChunk {
                                    path: path.clone(),
                                    text: buf[pos..pos + i].to_string(),
                                });
                            }
                            pos += i + FILE_CLOSE.len();
                            self.file = None;
                            events.push(ScanEvent::FileClosed { path });
                            self.phase = ScanPhase::InBody;
                        }
                        None => {
                            let keep = partial_marker_len(&buf[pos..], FILE_CLOSE);
                            let cut = buf.len() - keep;
                            if cut > pos {
                                events.push(ScanEvent::FileChunk {
                                    path,
                                    text: buf[pos..cut].to_string(),
                                });
                            }
                            pos = cut;
                            break 'outer;
                        }
                    }
                }
            }
        }

        self.buf = buf[pos..].to_string();
    }

    fn begin_tag(&mut self, target: TagTarget) {
        self.tag_buf.clear();
        self.tag_buf.push_str(target.marker());
        self.quote = None;
        self.escaped = false;
        self.phase = ScanPhase::InOpenTag { target };
    }
}

impl Default for StreamScanner {
    fn default() -> Self {
        Self::new()
    }
}
