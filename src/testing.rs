//! Deterministic stand-ins for the external tools, for unit tests.

use crate::align::{Aligner, Hit, Strand};
use crate::error::ToolError;
use crate::reference::ReferenceSearch;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

type AlignFn = dyn Fn(&[u8], &[u8]) -> Result<Vec<Hit>, ToolError> + Send + Sync;

/// An aligner whose answers are produced by a closure. Counts its invocations.
pub struct FakeAligner {
    respond: Box<AlignFn>,
    calls: AtomicUsize,
}

impl FakeAligner {
    pub fn new(
        respond: impl Fn(&[u8], &[u8]) -> Result<Vec<Hit>, ToolError> + Send + Sync + 'static,
    ) -> Self {
        FakeAligner {
            respond: Box::new(respond),
            calls: AtomicUsize::new(0),
        }
    }

    /// Never finds anything.
    pub fn empty() -> Self {
        Self::new(|_, _| Ok(Vec::new()))
    }

    /// Always reports the same hits.
    pub fn fixed(hits: Vec<Hit>) -> Self {
        Self::new(move |_, _| Ok(hits.clone()))
    }

    /// Always fails as if the tool had crashed.
    pub fn failing() -> Self {
        Self::new(|_, _| Err(tool_failure("fake-aligner")))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Aligner for FakeAligner {
    fn name(&self) -> &str {
        "fake-aligner"
    }

    fn align(&self, query: &[u8], subject: &[u8]) -> Result<Vec<Hit>, ToolError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (self.respond)(query, subject)
    }
}

/// A reference database holding a single reference, with scripted search results. Counts its
/// searches.
pub struct FakeDatabase {
    hits: Vec<Hit>,
    reference: Vec<u8>,
    fail: bool,
    searches: AtomicUsize,
}

impl FakeDatabase {
    pub fn new(hits: Vec<Hit>, reference: Vec<u8>) -> Self {
        FakeDatabase {
            hits,
            reference,
            fail: false,
            searches: AtomicUsize::new(0),
        }
    }

    /// Every search fails as if `blastn` had crashed.
    pub fn failing() -> Self {
        FakeDatabase {
            fail: true,
            ..Self::new(Vec::new(), Vec::new())
        }
    }

    pub fn searches(&self) -> usize {
        self.searches.load(Ordering::SeqCst)
    }
}

impl ReferenceSearch for FakeDatabase {
    fn search(&self, _query: &[u8]) -> Result<Vec<Hit>, ToolError> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(tool_failure("fake-blastn"));
        }
        Ok(self.hits.clone())
    }

    fn fetch(&self, _accession: &str) -> Result<Vec<u8>, ToolError> {
        Ok(self.reference.clone())
    }
}

impl<T: ReferenceSearch + ?Sized> ReferenceSearch for Arc<T> {
    fn search(&self, query: &[u8]) -> Result<Vec<Hit>, ToolError> {
        (**self).search(query)
    }

    fn fetch(&self, accession: &str) -> Result<Vec<u8>, ToolError> {
        (**self).fetch(accession)
    }
}

pub fn tool_failure(tool: &str) -> ToolError {
    ToolError::ExitStatus {
        tool: tool.to_string(),
        code: Some(1),
        stderr: String::from("simulated failure"),
    }
}

/// A gap-free plus-strand hit with 1-based inclusive coordinates.
pub fn hit(q_start: usize, q_end: usize, s_start: usize, s_end: usize) -> Hit {
    let length = q_end.abs_diff(q_start) + 1;
    Hit {
        query_id: String::from("query"),
        subject_id: String::from("subject"),
        identity: 100.0,
        length,
        mismatches: 0,
        gap_opens: 0,
        q_start,
        q_end,
        s_start,
        s_end,
        evalue: Some(1e-30),
        bitscore: 2.0 * length as f64,
        subject_acc: Some(String::from("REF_1")),
        strand: if s_start > s_end {
            Strand::Minus
        } else {
            Strand::Plus
        },
    }
}
