use indexmap::IndexMap;
use sqlweave_core::Value;

/// The linear accumulator dynamic nodes write into: SQL text plus the
/// evaluation-scope values that must survive into parameter binding
/// (`<bind>` results and uniquified foreach frames).
///
/// The accumulator never rewinds; trim nodes splice only the region their
/// own child produced.
#[derive(Debug, Default)]
pub struct SqlText {
    buf: String,
    extras: IndexMap<String, Value>,
    unique: usize,
}

impl SqlText {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_str(&mut self, text: &str) {
        self.buf.push_str(text);
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Splits off everything written since `start`, leaving the earlier
    /// content in place.
    pub fn split_off(&mut self, start: usize) -> String {
        self.buf.split_off(start)
    }

    /// Records a value under a name the binder can see after evaluation.
    pub fn bind_extra(&mut self, name: impl Into<String>, value: Value) {
        self.extras.insert(name.into(), value);
    }

    /// The next per-evaluation uniquifier for foreach frames.
    pub fn next_unique(&mut self) -> usize {
        let n = self.unique;
        self.unique += 1;
        n
    }

    pub fn extras(&self) -> &IndexMap<String, Value> {
        &self.extras
    }

    pub fn into_parts(self) -> (String, IndexMap<String, Value>) {
        (self.buf, self.extras)
    }
}
