//! Streaming `<attachments>…</attachments>` extractor.
//!
//! Consumes text chunks as they arrive from the provider stream and splits
//! them into `visible_text` (what the user sees) and complete `attachments`
//! (one path per `- /path` line inside the block). Resilient to a chunk
//! boundary splitting either tag: any suffix of a chunk that could be the
//! start of `<attachments>` is held back rather than emitted, and re-checked
//! against the next chunk. Shaped like `skynet_agent::stream::parse_sse_line`
//! — a small `match`-free byte-window state machine with one buffer.

const OPEN_TAG: &str = "<attachments>";
const CLOSE_TAG: &str = "</attachments>";

/// Output of one `push()` call: text to show the user, and any attachment
/// paths that completed during this call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractStep {
    pub visible_text: String,
    pub attachments: Vec<String>,
}

impl ExtractStep {
    fn text(s: impl Into<String>) -> Self {
        Self { visible_text: s.into(), attachments: Vec::new() }
    }
}

#[derive(Debug, Default)]
pub struct AttachmentExtractor {
    /// Unprocessed tail: either an ambiguous suffix that might be the start
    /// of `<attachments>` (when `in_block` is false), or the raw content
    /// accumulated since the open tag (when `in_block` is true).
    buf: String,
    in_block: bool,
}

impl AttachmentExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the next text chunk. May emit visible text, attachment paths,
    /// both, or neither (if the chunk only extends an ambiguous tail).
    pub fn push(&mut self, chunk: &str) -> ExtractStep {
        self.buf.push_str(chunk);
        let mut visible = String::new();
        let mut attachments = Vec::new();

        loop {
            if self.in_block {
                match self.buf.find(CLOSE_TAG) {
                    Some(idx) => {
                        let block = self.buf[..idx].to_string();
                        attachments.extend(parse_attachment_lines(&block));
                        self.buf.drain(..idx + CLOSE_TAG.len());
                        self.in_block = false;
                        // loop again: buf may contain another open tag already
                    }
                    None => break,
                }
            } else {
                match self.buf.find(OPEN_TAG) {
                    Some(idx) => {
                        visible.push_str(&self.buf[..idx]);
                        self.buf.drain(..idx + OPEN_TAG.len());
                        self.in_block = true;
                    }
                    None => {
                        let tail_len = ambiguous_tail_len(&self.buf, OPEN_TAG);
                        let split = self.buf.len() - tail_len;
                        visible.push_str(&self.buf[..split]);
                        self.buf.drain(..split);
                        break;
                    }
                }
            }
        }

        ExtractStep { visible_text: visible, attachments }
    }

    /// Releases any buffered state at stream end. A held-back ambiguous tail
    /// (never became a tag) is released as plain text. An unterminated
    /// `<attachments>` block is released verbatim — tag included, no
    /// silent swallow of the text or loss of reported paths.
    pub fn flush_remainder(&mut self) -> ExtractStep {
        if self.buf.is_empty() {
            return ExtractStep::default();
        }
        let step = if self.in_block {
            ExtractStep::text(format!("{OPEN_TAG}{}", self.buf))
        } else {
            ExtractStep::text(std::mem::take(&mut self.buf))
        };
        self.buf.clear();
        self.in_block = false;
        step
    }
}

/// Longest suffix of `s` that is also a strict (non-full) prefix of
/// `pattern` — the part of `s` that could still grow into `pattern` given
/// more input, so must not be emitted as visible text yet.
fn ambiguous_tail_len(s: &str, pattern: &str) -> usize {
    let max = pattern.len().saturating_sub(1).min(s.len());
    for len in (1..=max).rev() {
        if s.ends_with(&pattern[..len]) {
            return len;
        }
    }
    0
}

/// Parses `- /path` lines out of a completed `<attachments>` block body.
fn parse_attachment_lines(block: &str) -> Vec<String> {
    block
    .lines()
    .filter_map(|line| {
            let line = line.trim();
            let path = line.strip_prefix("- ")?.trim();
            if path.is_empty() {
                None
            } else {
                Some(path.to_string())
            }
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passes_through_plain_text_unchanged() {
        let mut ex = AttachmentExtractor::new();
        let step = ex.push("hello world");
        assert_eq!(step.visible_text, "hello world");
        assert!(step.attachments.is_empty());
        assert_eq!(ex.flush_remainder().visible_text, "");
    }

    #[test]
    fn extracts_single_complete_block_in_one_chunk() {
        let mut ex = AttachmentExtractor::new();
        let step = ex.push("see this <attachments>\n- /tmp/a.png\n</attachments> ok");
        assert_eq!(step.visible_text, "see this ok");
        assert_eq!(step.attachments, vec!["/tmp/a.png"]);
    }

    #[test]
    fn extracts_multiple_paths() {
        let mut ex = AttachmentExtractor::new();
        let step = ex.push("<attachments>\n- /a.png\n- /b.png\n</attachments>");
        assert_eq!(step.attachments, vec!["/a.png", "/b.png"]);
        assert_eq!(step.visible_text, "");
    }

    #[test]
    fn open_tag_split_across_chunks() {
        let mut ex = AttachmentExtractor::new();
        let s1 = ex.push("before <attach");
        assert_eq!(s1.visible_text, "before ");
        let s2 = ex.push("ments>\n- /x\n</attachments> after");
        assert_eq!(s2.visible_text, " after");
        assert_eq!(s2.attachments, vec!["/x"]);
    }

    #[test]
    fn close_tag_split_across_chunks() {
        let mut ex = AttachmentExtractor::new();
        let s1 = ex.push("<attachments>\n- /x\n</attach");
        assert!(s1.visible_text.is_empty());
        assert!(s1.attachments.is_empty());
        let s2 = ex.push("ments>tail");
        assert_eq!(s2.visible_text, "tail");
        assert_eq!(s2.attachments, vec!["/x"]);
    }

    #[test]
    fn ambiguous_tail_that_never_completes_is_released_on_next_unrelated_text() {
        let mut ex = AttachmentExtractor::new();
        let s1 = ex.push("weird <attac");
        assert_eq!(s1.visible_text, "weird ");
        let s2 = ex.push("kwards no tag here");
        assert_eq!(s2.visible_text, "<attackwards no tag here");
    }

    #[test]
    fn flush_releases_unclosed_block_verbatim() {
        let mut ex = AttachmentExtractor::new();
        let step = ex.push("before <attachments>\n- /never/closed");
        assert_eq!(step.visible_text, "before ");
        assert!(step.attachments.is_empty());
        let flushed = ex.flush_remainder();
        assert_eq!(flushed.visible_text, "<attachments>\n- /never/closed");
        assert!(flushed.attachments.is_empty());
    }

    #[test]
    fn flush_releases_ambiguous_tail_as_text() {
        let mut ex = AttachmentExtractor::new();
        ex.push("trailing <attach");
        let flushed = ex.flush_remainder();
        assert_eq!(flushed.visible_text, "<attach");
    }

    #[test]
    fn empty_lines_and_non_dash_lines_inside_block_are_ignored() {
        let mut ex = AttachmentExtractor::new();
        let step = ex.push("<attachments>\nnote: see below\n- /a.png\n\n</attachments>");
        assert_eq!(step.attachments, vec!["/a.png"]);
    }
}
