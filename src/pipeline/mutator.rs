use crate::crypto::Keystream;
use std::fmt;

/// An in-place transform over a run of buffer bytes.
///
/// Mutators are applied exactly once to every byte, in stream order, so a
/// stateful transform such as a keystream stays in step with the peer.
pub trait BufferMutator: Send {
    fn mutate(&mut self, region: &mut [u8]);
}

impl<F> BufferMutator for F
where
    F: FnMut(&mut [u8]) + Send,
{
    fn mutate(&mut self, region: &mut [u8]) {
        self(region)
    }
}

/// Mutators applied left to right.
#[derive(Default)]
pub struct MutatorChain {
    mutators: Vec<Box<dyn BufferMutator>>,
}

impl MutatorChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, mutator: impl BufferMutator + 'static) {
        self.mutators.push(Box::new(mutator));
    }

    pub fn len(&self) -> usize {
        self.mutators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mutators.is_empty()
    }

    pub fn apply(&mut self, region: &mut [u8]) {
        if region.is_empty() {
            return;
        }
        for mutator in &mut self.mutators {
            mutator.mutate(region);
        }
    }
}

impl fmt::Debug for MutatorChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MutatorChain")
            .field("len", &self.mutators.len())
            .finish()
    }
}

/// Applies one direction of an RC4 session.
#[derive(Debug)]
pub struct CipherMutator {
    keystream: Keystream,
}

impl CipherMutator {
    pub fn new(keystream: Keystream) -> Self {
        Self { keystream }
    }
}

impl BufferMutator for CipherMutator {
    fn mutate(&mut self, region: &mut [u8]) {
        self.keystream.apply(region);
    }
}
