use crate::server::events::{LogEntry, Severity};
use once_cell::sync::Lazy;
use regex::Regex;

/// A line starting a new log record carries the vanilla server's
/// thread-prefixed timestamp tag, e.g. `[12:34:56] [Server thread/INFO]:`.
static RECORD_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\[\d{2}:\d{2}:\d{2}\] \[").expect("record prefix regex"));

/// Full header of a record's first line: timestamp, thread, level, body.
static RECORD_HEADER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\[\d{2}:\d{2}:\d{2}\] \[([^/\]]+)/([^\]]+)\]:\s?(.*)$")
        .expect("record header regex")
});

/// The fixed sentence the vanilla server prints when eula.txt has not been
/// accepted yet.
const EULA_SENTENCE: &str =
    "You need to agree to the EULA in order to run the server. Go to eula.txt for more info.";

/// Main server thread name; only its "Done (...)" record means ready.
const SERVER_THREAD: &str = "Server thread";

/// Semantic significance of a record, evaluated independently per pattern.
/// In practice at most one flag is set, but the patterns are not mutually
/// exclusive by construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Signals {
    /// The server finished starting up.
    pub ready: bool,
    /// The server announced its own shutdown.
    pub stopping: bool,
    /// The server refuses to run until the EULA is accepted.
    pub eula_required: bool,
}

/// A complete log record with its severity and semantic signals.
#[derive(Debug, Clone)]
pub struct ClassifiedRecord {
    pub entry: LogEntry,
    pub signals: Signals,
}

/// Turns raw output chunks from the server process into classified records.
///
/// Bytes accumulate in a carry buffer until a line terminator is seen (CRLF
/// normalized). Complete lines are grouped into records by the timestamp
/// prefix: a matching line starts a new record, anything else continues the
/// previous one (stack traces span several lines). A record still open at the
/// end of a chunk is flushed unless a partial line is pending, so records only
/// span chunk boundaries while their last line is incomplete — this keeps
/// single-line records (the "Done" line in particular) prompt.
///
/// The classifier is pure: it never touches supervisor state. The supervisor
/// applies the returned signals.
#[derive(Debug, Default)]
pub struct LogClassifier {
    carry: Vec<u8>,
    open_record: Option<String>,
}

impl LogClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a raw chunk of process output; returns the records completed by it.
    ///
    /// The carry buffer holds raw bytes; decoding happens per complete line,
    /// so a multibyte character split across two chunks survives intact.
    pub fn push_chunk(&mut self, chunk: &[u8]) -> Vec<ClassifiedRecord> {
        self.carry.extend_from_slice(chunk);

        let mut out = Vec::new();
        while let Some(pos) = self.carry.iter().position(|&b| b == b'\n') {
            let mut line: Vec<u8> = self.carry.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            self.push_line(String::from_utf8_lossy(&line).into_owned(), &mut out);
        }

        if self.carry.is_empty() {
            if let Some(record) = self.open_record.take() {
                out.push(classify_record(record));
            }
        }

        out
    }

    /// Flush whatever is still buffered; call when the output stream closes.
    pub fn finish(&mut self) -> Vec<ClassifiedRecord> {
        let mut out = Vec::new();
        if !self.carry.is_empty() {
            let line = String::from_utf8_lossy(&self.carry).into_owned();
            self.carry.clear();
            self.push_line(line, &mut out);
        }
        if let Some(record) = self.open_record.take() {
            out.push(classify_record(record));
        }
        out
    }

    fn push_line(&mut self, line: String, out: &mut Vec<ClassifiedRecord>) {
        if RECORD_PREFIX.is_match(&line) {
            if let Some(record) = self.open_record.replace(line) {
                out.push(classify_record(record));
            }
        } else if let Some(open) = self.open_record.as_mut() {
            open.push('\n');
            open.push_str(&line);
        } else {
            // Output before the first tagged record (JVM banners and the like)
            // passes through as a record of its own.
            out.push(classify_record(line));
        }
    }
}

/// Classify one complete record: severity by substring, signals by the first
/// line's header.
fn classify_record(text: String) -> ClassifiedRecord {
    let severity = if text.contains("/WARN]") {
        Severity::Warn
    } else if text.contains("/ERROR]") {
        Severity::Error
    } else {
        Severity::Info
    };

    let mut signals = Signals::default();
    let first_line = text.lines().next().unwrap_or("");
    if let Some(caps) = RECORD_HEADER.captures(first_line) {
        let thread = caps.get(1).map(|m| m.as_str()).unwrap_or("");
        let body = caps.get(3).map(|m| m.as_str()).unwrap_or("");

        signals.ready = thread == SERVER_THREAD && body.starts_with("Done (");
        signals.stopping = body.starts_with("Stopping server");
        signals.eula_required = body == EULA_SENTENCE;
    }

    ClassifiedRecord {
        entry: LogEntry::new(severity, text),
        signals,
    }
}
