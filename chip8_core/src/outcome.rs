pub mod outcome {
    /// What a call to `step` did, for the driving loop.
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub enum StepOutcome {
        /// An instruction ran.
        Executed,
        /// The CPU is parked on `LD Vx, K` until a key is pressed.
        Waiting,
        /// `EXIT` was executed; pc stays on it.
        Exited,
    }
}
