use std::net::SocketAddr;
use serde::{Deserialize, Serialize};
use crate::block_array::BlockArray;
use crate::data_block::CellValue;
use crate::error::{Error, Result};
use crate::exchange::{ExchangePattern, WaitDiscipline};
use crate::traversal::{Periodicity, Trim};




/**
 * A class of neighbor adjacency, by the number of axes on which two
 * adjacent boxes differ.
 */
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Adjacency {
    Face,
    Edge,
    Corner,
}




/**
 * User-facing settings for building an exchange pattern.
 */
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HaloConfig {
    /// Number of ghost layers to fill. `None` means the array's ghost width.
    pub num_ghost: Option<i64>,
    /// Periodic flag for each axis, starting with axis 0.
    pub periodic: Vec<bool>,
    /// Adjacency classes whose neighbors are not exchanged with.
    pub trim: Vec<Adjacency>,
    pub wait: WaitDiscipline,
    pub start_comp: usize,
    /// Number of components to exchange. `None` means through the last one.
    pub num_comp: Option<usize>,
}

impl Default for HaloConfig {
    fn default() -> Self {
        Self {
            num_ghost: None,
            periodic: Vec::new(),
            trim: Vec::new(),
            wait: WaitDiscipline::default(),
            start_comp: 0,
            num_comp: None,
        }
    }
}




// ============================================================================
impl HaloConfig {

    pub fn periodicity(&self) -> Periodicity {
        Periodicity::from_axes(&self.periodic)
    }

    pub fn trim(&self) -> Trim {
        self.trim.iter().fold(Trim::NONE, |trim, class| {
            trim | match class {
                Adjacency::Face => Trim::FACE,
                Adjacency::Edge => Trim::EDGE,
                Adjacency::Corner => Trim::CORNER,
            }
        })
    }

    /**
     * Check the settings against an array, and build the exchange pattern
     * they describe.
     */
    pub fn build_pattern<T: CellValue, const DIM: usize>(&self, array: &BlockArray<T, DIM>) -> Result<ExchangePattern<DIM>> {
        let num_ghost = self.num_ghost.unwrap_or_else(|| array.nghost());
        let num_comp = match self.num_comp {
            Some(n) => n,
            None => array.ncomp().saturating_sub(self.start_comp),
        };

        if self.periodic.len() > DIM {
            return Err(Error::Config(format!(
                "{} periodic flags given for a {}-dimensional layout",
                self.periodic.len(),
                DIM
            )));
        }
        if num_ghost < 0 || num_ghost > array.nghost() {
            return Err(Error::Config(format!(
                "ghost width {} must be between 0 and the array's {}",
                num_ghost,
                array.nghost()
            )));
        }
        if num_comp == 0 || self.start_comp + num_comp > array.ncomp() {
            return Err(Error::Config(format!(
                "components [{}, {}) are not within the array's {}",
                self.start_comp,
                self.start_comp + num_comp,
                array.ncomp()
            )));
        }

        let pattern = ExchangePattern::new::<T>(
            array.layout(),
            num_ghost,
            self.start_comp,
            num_comp,
            self.periodicity(),
            self.trim(),
        );
        Ok(pattern.with_wait(self.wait))
    }
}




/**
 * Selects how the ranks of a run reach each other.
 */
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TransportConfig {
    /// A single process, with no messaging.
    Serial,
    /// Every rank is a thread of this process.
    Threads { ranks: usize },
    /// This process is one rank of a group connected over TCP.
    Tcp { rank: usize, peers: Vec<SocketAddr> },
}

impl Default for TransportConfig {
    fn default() -> Self {
        TransportConfig::Serial
    }
}

impl TransportConfig {

    /// Return the total number of ranks in the run.
    pub fn num_ranks(&self) -> usize {
        match self {
            TransportConfig::Serial => 1,
            TransportConfig::Threads { ranks } => *ranks,
            TransportConfig::Tcp { peers, .. } => peers.len(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            TransportConfig::Threads { ranks: 0 } => Err(Error::Config("a run needs at least one rank".to_string())),
            TransportConfig::Tcp { rank, peers } if *rank >= peers.len() => Err(Error::Config(format!(
                "rank {} is out of range for {} peers",
                rank,
                peers.len()
            ))),
            _ => Ok(()),
        }
    }
}
