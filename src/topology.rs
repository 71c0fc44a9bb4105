use std::fmt;
use std::sync::Arc;
use crate::message::{Communicator, SerialCommunicator};




/**
 * The process group a layout is distributed over: this process's rank, the
 * number of processes, and the communicator used to reach the others. A
 * topology is cheap to clone; clones share the communicator.
 */
#[derive(Clone)]
pub struct Topology {
    rank: usize,
    size: usize,
    comm: Arc<dyn Communicator>,
}




// ============================================================================
impl Topology {

    pub fn new<C: Communicator + 'static>(comm: C) -> Self {
        Self::from_shared(Arc::new(comm))
    }

    pub fn from_shared(comm: Arc<dyn Communicator>) -> Self {
        Self {
            rank: comm.rank(),
            size: comm.size(),
            comm,
        }
    }

    /**
     * A topology with a single process, which owns every box.
     */
    pub fn serial() -> Self {
        Self::new(SerialCommunicator::new())
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn comm(&self) -> &dyn Communicator {
        self.comm.as_ref()
    }
}

impl fmt::Debug for Topology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Topology")
            .field("rank", &self.rank)
            .field("size", &self.size)
            .finish()
    }
}
