// MPI-based communicator (feature "mpi")

use mpi::topology::SimpleCommunicator;
use mpi::traits::*;

pub struct MpiComm {
    pub world: SimpleCommunicator,
    pub rank: usize,
    pub size: usize,
}

impl MpiComm {
    pub fn new() -> Self {
        let universe = mpi::initialize().unwrap();
        let world = universe.world();
        let rank = world.rank() as usize;
        let size = world.size() as usize;
        MpiComm { world, rank, size }
    }

    /// Gather equally-sized owned slices onto the root process.
    pub fn gather(&self, local: &[f64], out: &mut Vec<f64>, root: usize) {
        let mut recvbuf = if self.rank == root {
            vec![0.0; local.len() * self.size]
        } else {
            Vec::new()
        };
        self.world
            .process_at_rank(root as i32)
            .gather_into_root(local, &mut recvbuf);
        if self.rank == root {
            *out = recvbuf;
        }
    }

    /// Scatter equally-sized blocks from the root process.
    pub fn scatter(&self, global: &[f64], out: &mut [f64], root: usize) {
        self.world
            .process_at_rank(root as i32)
            .scatter_into_root(global, out);
    }
}

impl super::Comm for MpiComm {
    fn rank(&self) -> usize {
        self.rank
    }
    fn size(&self) -> usize {
        self.size
    }
    fn barrier(&self) {
        self.world.barrier();
    }
    fn all_reduce(&self, x: f64) -> f64 {
        use mpi::collective::SystemOperation;
        let mut y = x;
        self.world.all_reduce_into(&x, &mut y, &SystemOperation::sum());
        y
    }
}
