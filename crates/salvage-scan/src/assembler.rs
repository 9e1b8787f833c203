//! Assembles scanner events into immutable [`Artifact`] values.
//!
//! One assembler follows one message stream at a time. Call
//! [`reset`](ArtifactAssembler::reset) before a new message — that is the
//! mechanism that prevents state from one generated message bleeding into the
//! next. Validation failures surface as [`DetectionEvent::ArtifactMalformed`]
//! diagnostics; they never terminate the stream.

use salvage_types::{Artifact, ArtifactKind, ArtifactOrigin, FileEntry};

use crate::events::DetectionEvent;
use crate::scanner::ScanEvent;
use crate::tag::BlockHeader;

/// Confidence assigned to artifacts recognized by the bare-fence fallback,
/// below the 1.0 of a well-formed block.
const BARE_FENCE_CONFIDENCE: f32 = 0.5;

#[derive(Debug)]
struct PartialRecord {
    header: BlockHeader,
    files: Vec<FileEntry>,
    open_file: Option<usize>,
}

/// Consumes [`ScanEvent`]s and emits [`DetectionEvent`]s for one message.
#[derive(Debug, Default)]
pub struct ArtifactAssembler {
    message_id: Option<String>,
    current: Option<PartialRecord>,
    /// Accumulated out-of-block text, mined for bare code fences on finish.
    prose: String,
}

impl ArtifactAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin a new message, discarding any in-progress partial record.
    pub fn reset(&mut self, message_id: impl Into<String>) {
        let message_id = message_id.into();
        if self.current.is_some() {
            tracing::debug!(message = %message_id, "discarding partial record on reset");
        }
        self.message_id = Some(message_id);
        self.current = None;
        self.prose.clear();
    }

    /// Process one scanner event.
    pub fn observe(&mut self, event: &ScanEvent) -> Vec<DetectionEvent> {
        match event {
            ScanEvent::BlockOpened { header } => {
                if self.current.is_some() {
                    tracing::debug!(
                        identifier = %header.identifier,
                        "new block opened over an unfinished one, dropping the old record"
                    );
                }
                let out = vec![DetectionEvent::ArtifactOpened {
                    identifier: header.identifier.clone(),
                    kind: header.kind.clone(),
                    title: header.title.clone(),
                }];
                self.current = Some(PartialRecord {
                    header: header.clone(),
                    files: Vec::new(),
                    open_file: None,
                });
                out
            }
            ScanEvent::FileStarted { path } => {
                if let Some(record) = self.current.as_mut() {
                    record.files.push(FileEntry {
                        path: path.clone(),
                        content: String::new(),
                    });
                    record.open_file = Some(record.files.len() - 1);
                }
                Vec::new()
            }
            ScanEvent::FileChunk { path, text } => {
                let Some(record) = self.current.as_mut() else {
                    return Vec::new();
                };
                let Some(idx) = record.open_file else {
                    return Vec::new();
                };
                record.files[idx].content.push_str(text);
                vec![DetectionEvent::ArtifactProgress {
                    identifier: record.header.identifier.clone(),
                    path: path.clone(),
                    content: record.files[idx].content.clone(),
                }]
            }
            ScanEvent::FileClosed { .. } => {
                if let Some(record) = self.current.as_mut() {
                    record.open_file = None;
                }
                Vec::new()
            }
            ScanEvent::BlockClosed { identifier } => {
                let Some(record) = self.current.take() else {
                    return Vec::new();
                };
                match Self::validate(record) {
                    Ok(artifact) => vec![DetectionEvent::ArtifactClosed { artifact }],
                    Err(reasons) => {
                        tracing::debug!(identifier = %identifier, ?reasons, "malformed artifact dropped");
                        vec![DetectionEvent::ArtifactMalformed {
                            identifier: identifier.clone(),
                            reasons,
                        }]
                    }
                }
            }
            ScanEvent::Prose { text } => {
                self.prose.push_str(text);
                Vec::new()
            }
        }
    }

    /// The stream is complete. Drops any unfinished record and runs the
    /// best-effort fallback detector over accumulated prose: bare fenced code
    /// that matches component-file conventions still yields a (lower
    /// confidence) artifact so the UI can offer a preview action.
    pub fn finish(&mut self) -> Vec<DetectionEvent> {
        if let Some(record) = self.current.take() {
            tracing::debug!(
                identifier = %record.header.identifier,
                "stream ended mid-block, partial record dropped"
            );
        }
        let prose = std::mem::take(&mut self.prose);
        detect_bare_fences(&prose)
            .into_iter()
            .map(|artifact| DetectionEvent::ArtifactClosed { artifact })
            .collect()
    }

    fn validate(record: PartialRecord) -> Result<Artifact, Vec<String>> {
        let mut reasons = Vec::new();
        if record.header.identifier.trim().is_empty() {
            reasons.push("missing identifier".to_string());
        }
        if record.header.kind.is_none() {
            reasons.push("missing kind".to_string());
        }
        if record.header.title.trim().is_empty() {
            reasons.push("missing title".to_string());
        }
        if record.files.is_empty() {
            reasons.push("no file sections".to_string());
        }
        match record.header.kind {
            Some(kind) if reasons.is_empty() => Ok(Artifact {
                identifier: record.header.identifier,
                kind,
                title: record.header.title,
                description: record.header.description,
                files: record.files,
                dependencies: record.header.dependencies,
                origin: ArtifactOrigin::Block,
                confidence: 1.0,
            }),
            _ => Err(reasons),
        }
    }
}

/// Scan free text for fenced code blocks whose content matches known
/// component-file conventions.
fn detect_bare_fences(prose: &str) -> Vec<Artifact> {
    let fence = regex::Regex::new(r"(?ms)^```([A-Za-z0-9_+-]*)[ \t]*\r?\n(.*?)^```[ \t]*$")
        .unwrap();
    let mut found = Vec::new();
    for cap in fence.captures_iter(prose) {
        let info = cap.get(1).map(|m| m.as_str()).unwrap_or("");
        let body = cap.get(2).map(|m| m.as_str()).unwrap_or("");
        if !looks_like_component(body) {
            continue;
        }
        let identifier = format!("bare-{}", uuid::Uuid::new_v4());
        tracing::debug!(identifier = %identifier, "bare code fence recognized as component");
        found.push(Artifact {
            identifier,
            kind: ArtifactKind::Component,
            title: "Untitled component".to_string(),
            description: None,
            files: vec![FileEntry {
                path: default_path(info),
                content: body.to_string(),
            }],
            dependencies: Vec::new(),
            origin: ArtifactOrigin::BareFence,
            confidence: BARE_FENCE_CONFIDENCE,
        });
    }
    found
}

fn looks_like_component(body: &str) -> bool {
    let conventions = regex::Regex::new(
        r#"(?m)^\s*export\s+default\s+(function|class)\b|from\s+['"]react['"]|^\s*import\s+React\b"#,
    )
    .unwrap();
    conventions.is_match(body)
}

fn default_path(info: &str) -> String {
    match info {
        "tsx" | "typescript" => "Component.tsx".to_string(),
        _ => "Component.jsx".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::StreamScanner;

    fn run(input: &str) -> Vec<DetectionEvent> {
        let mut scanner = StreamScanner::new();
        let mut assembler = ArtifactAssembler::new();
        assembler.reset("msg-1");
        let mut out = Vec::new();
        for ev in scanner.feed(input) {
            out.extend(assembler.observe(&ev));
        }
        for ev in scanner.finish() {
            out.extend(assembler.observe(&ev));
        }
        out.extend(assembler.finish());
        out
    }

    fn closed(events: &[DetectionEvent]) -> Vec<&Artifact> {
        events
            .iter()
            .filter_map(|e| match e {
                DetectionEvent::ArtifactClosed { artifact } => Some(artifact),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn well_formed_block_assembles() {
        let events = run(concat!(
            "<artifact identifier=\"viz-1\" kind=\"component\" title=\"Chart\" dependencies=\"d3@7\">",
            "<file path=\"Chart.jsx\">export default function Chart() {}</file>",
            "</artifact>"
        ));
        let artifacts = closed(&events);
        assert_eq!(artifacts.len(), 1);
        let a = artifacts[0];
        assert_eq!(a.identifier, "viz-1");
        assert_eq!(a.kind, ArtifactKind::Component);
        assert_eq!(a.origin, ArtifactOrigin::Block);
        assert_eq!(a.confidence, 1.0);
        assert_eq!(a.files.len(), 1);
        assert_eq!(a.dependencies[0].name, "d3");
    }

    #[test]
    fn progress_carries_accumulated_content() {
        let mut scanner = StreamScanner::new();
        let mut assembler = ArtifactAssembler::new();
        assembler.reset("msg-1");

        let mut progress = Vec::new();
        for chunk in [
            "<artifact identifier=\"p\" kind=\"component\" title=\"P\"><file path=\"a.jsx\">hel",
            "lo wor",
            "ld</file></artifact>",
        ] {
            for ev in scanner.feed(chunk) {
                for dev in assembler.observe(&ev) {
                    if let DetectionEvent::ArtifactProgress { content, .. } = dev {
                        progress.push(content);
                    }
                }
            }
        }
        assert_eq!(progress, vec!["hel", "hello wor", "hello world"]);
    }

    #[test]
    fn missing_title_is_malformed_not_fatal() {
        let events = run(concat!(
            "<artifact identifier=\"x\" kind=\"component\">",
            "<file path=\"a.jsx\">body</file>",
            "</artifact>",
            "<artifact identifier=\"y\" kind=\"component\" title=\"Ok\">",
            "<file path=\"b.jsx\">body</file>",
            "</artifact>"
        ));
        let malformed: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                DetectionEvent::ArtifactMalformed {
                    identifier,
                    reasons,
                } => Some((identifier.clone(), reasons.clone())),
                _ => None,
            })
            .collect();
        assert_eq!(malformed.len(), 1);
        assert_eq!(malformed[0].0, "x");
        assert!(malformed[0].1.contains(&"missing title".to_string()));
        // The stream continued; the next block assembled normally.
        assert_eq!(closed(&events).len(), 1);
        assert_eq!(closed(&events)[0].identifier, "y");
    }

    #[test]
    fn block_without_files_is_malformed() {
        let events = run("<artifact identifier=\"e\" kind=\"markup\" title=\"E\"></artifact>");
        let reasons = events
            .iter()
            .find_map(|e| match e {
                DetectionEvent::ArtifactMalformed { reasons, .. } => Some(reasons.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(reasons, vec!["no file sections".to_string()]);
    }

    #[test]
    fn truncated_block_emits_nothing_on_finish() {
        let events = run(
            "<artifact identifier=\"t\" kind=\"component\" title=\"T\"><file path=\"a.jsx\">cut off",
        );
        assert!(closed(&events).is_empty());
        assert!(!events
            .iter()
            .any(|e| matches!(e, DetectionEvent::ArtifactMalformed { .. })));
    }

    #[test]
    fn reset_prevents_cross_message_bleed() {
        let mut scanner = StreamScanner::new();
        let mut assembler = ArtifactAssembler::new();

        // Message 1 ends mid-block with identifier "shared".
        assembler.reset("msg-1");
        for ev in scanner.feed(
            "<artifact identifier=\"shared\" kind=\"component\" title=\"Old\"><file path=\"old.jsx\">stale",
        ) {
            assembler.observe(&ev);
        }

        // New message reuses the identifier; prior partial state must not leak.
        scanner.reset();
        assembler.reset("msg-2");
        let mut events = Vec::new();
        for ev in scanner.feed(concat!(
            "<artifact identifier=\"shared\" kind=\"component\" title=\"New\">",
            "<file path=\"new.jsx\">fresh</file></artifact>"
        )) {
            events.extend(assembler.observe(&ev));
        }
        let artifacts = closed(&events);
        assert_eq!(artifacts.len(), 1);
        assert_eq!(artifacts[0].title, "New");
        assert_eq!(artifacts[0].files.len(), 1);
        assert_eq!(artifacts[0].files[0].path, "new.jsx");
        assert_eq!(artifacts[0].files[0].content, "fresh");
    }

    #[test]
    fn bare_fence_fallback_yields_low_confidence_artifact() {
        let events = run(concat!(
            "Here's a quick version without the wrapper:\n",
            "```jsx\n",
            "import React from \"react\";\n",
            "export default function Quick() { return <div />; }\n",
            "```\n"
        ));
        let artifacts = closed(&events);
        assert_eq!(artifacts.len(), 1);
        let a = artifacts[0];
        assert_eq!(a.origin, ArtifactOrigin::BareFence);
        assert!(a.confidence < 1.0);
        assert!(a.identifier.starts_with("bare-"));
        assert_eq!(a.files[0].path, "Component.jsx");
        assert!(a.files[0].content.contains("function Quick"));
    }

    #[test]
    fn non_component_fence_is_ignored() {
        let events = run("```sh\necho hello\n```\n");
        assert!(closed(&events).is_empty());
    }

    #[test]
    fn tsx_fence_gets_tsx_path() {
        let events = run(concat!(
            "```tsx\n",
            "export default function T(): JSX.Element { return null; }\n",
            "```\n"
        ));
        let artifacts = closed(&events);
        assert_eq!(artifacts.len(), 1);
        assert_eq!(artifacts[0].files[0].path, "Component.tsx");
    }

    #[test]
    fn fence_inside_verbatim_section_is_not_fallback_material() {
        let events = run(concat!(
            "<artifact identifier=\"real\" kind=\"component\" title=\"R\">",
            "<file path=\"a.jsx\">```jsx\nexport default function Inner() {}\n```</file>",
            "</artifact>"
        ));
        // Only the block artifact — the fence lives inside its payload.
        let artifacts = closed(&events);
        assert_eq!(artifacts.len(), 1);
        assert_eq!(artifacts[0].identifier, "real");
    }
}
