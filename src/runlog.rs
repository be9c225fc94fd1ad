use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::summary::RunSummary;

// Opt-in JSON-line run log, one object per line with a monotonically
// increasing seq. Clones share the writer; a write failure drops the line,
// never the run.
#[derive(Clone)]
pub struct RunLogger {
    inner: Arc<Mutex<RunLogState>>,
}

struct RunLogState {
    writer: BufWriter<File>,
    seq: u64,
}

impl RunLogger {
    pub fn create(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = File::create(path)?;
        Ok(Self {
            inner: Arc::new(Mutex::new(RunLogState {
                writer: BufWriter::new(file),
                seq: 0,
            })),
        })
    }

    pub fn log(&self, event: &str, fields: &[(&str, &str)]) {
        if let Ok(mut state) = self.inner.lock() {
            state.seq += 1;
            let mut line = format!(
                "{{\"seq\":{},\"event\":\"{}\"",
                state.seq,
                json_escape(event)
            );
            for (key, value) in fields {
                line.push_str(&format!(
                    ",\"{}\":\"{}\"",
                    json_escape(key),
                    json_escape(value)
                ));
            }
            line.push('}');
            let _ = writeln!(state.writer, "{line}");
        }
    }

    pub fn finish(&self, summary: &RunSummary) {
        if let Ok(mut state) = self.inner.lock() {
            state.seq += 1;
            let aborted = match &summary.aborted {
                Some(reason) => format!("\"{}\"", json_escape(reason)),
                None => "null".to_string(),
            };
            let line = format!(
                "{{\"seq\":{},\"event\":\"run.finish\",\"rendered\":{},\"duplicates\":{},\"invalid\":{},\"failed\":{},\"aborted\":{}}}",
                state.seq,
                summary.rendered(),
                summary.duplicates(),
                summary.invalid(),
                summary.failed(),
                aborted
            );
            let _ = writeln!(state.writer, "{line}");
            let _ = state.writer.flush();
        }
    }
}

fn json_escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + 8);
    for ch in raw.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            _ => out.push(ch),
        }
    }
    out
}
