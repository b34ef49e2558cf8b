use std::io::Write;
use std::sync::Mutex;

use crate::record::ReconRecord;

// -------------------------------------------------------------------------------------------------
// RecordSink
// -------------------------------------------------------------------------------------------------
/// Somewhere recon records can be written to.
pub trait RecordSink: Send + Sync {
    fn write_record(&self, record: &ReconRecord) -> std::io::Result<()>;
}

impl<S: RecordSink + ?Sized> RecordSink for std::sync::Arc<S> {
    fn write_record(&self, record: &ReconRecord) -> std::io::Result<()> {
        (**self).write_record(record)
    }
}

/// Writes each record as a single line of JSON.
pub struct JsonLinesSink<W> {
    writer: Mutex<W>,
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }
}

impl<W: Write + Send> RecordSink for JsonLinesSink<W> {
    fn write_record(&self, record: &ReconRecord) -> std::io::Result<()> {
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| std::io::Error::new(std::io::ErrorKind::Other, "output writer poisoned"))?;
        serde_json::to_writer(&mut *writer, record)?;
        writeln!(writer)?;
        writer.flush()
    }
}

// -------------------------------------------------------------------------------------------------
// Dispatch
// -------------------------------------------------------------------------------------------------
/// The single point through which all records leave the process.
///
/// Any user login that matches the authenticated caller is blanked before the record is written.
pub struct Dispatch {
    sink: Box<dyn RecordSink>,
    self_login: String,
}

impl Dispatch {
    pub fn new(sink: Box<dyn RecordSink>) -> Self {
        Dispatch {
            sink,
            self_login: String::new(),
        }
    }

    /// Redact the given login from every record emitted from now on.
    pub fn with_self_login<S: Into<String>>(mut self, login: S) -> Self {
        self.self_login = login.into();
        self
    }

    pub fn self_login(&self) -> &str {
        &self.self_login
    }

    pub fn emit(&self, mut record: ReconRecord) -> std::io::Result<()> {
        self.redact(&mut record);
        self.sink.write_record(&record)
    }

    fn redact(&self, record: &mut ReconRecord) {
        if self.self_login.is_empty() {
            return;
        }
        if let Some(user) = record.user.as_mut() {
            user.redact(&self.self_login);
        }
        if let Some(repo) = record.repository.as_mut() {
            for contributor in repo.contributors.iter_mut() {
                contributor.redact(&self.self_login);
            }
        }
    }
}
