//! Destination for accepted spikes.

use crate::errors::Result;
use crate::types::SpikeRecord;

/// Receives spikes in emission order (non-decreasing frame per channel).
pub trait SpikeSink {
    fn accept(&mut self, spike: SpikeRecord) -> Result<()>;
}

/// Collects spikes in memory. Mainly useful in tests and small runs.
#[derive(Debug, Default)]
pub struct VecSink {
    pub spikes: Vec<SpikeRecord>,
}

impl VecSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SpikeSink for VecSink {
    fn accept(&mut self, spike: SpikeRecord) -> Result<()> {
        self.spikes.push(spike);
        Ok(())
    }
}

impl<T: SpikeSink + ?Sized> SpikeSink for &mut T {
    fn accept(&mut self, spike: SpikeRecord) -> Result<()> {
        (**self).accept(spike)
    }
}
