/// What a busy loop does between failed acquisition attempts.
pub(crate) trait Relax {
    fn relax();
}

/// Spin without a hint. Only useful when the hold is a handful of cycles.
#[allow(dead_code)]
#[derive(Default, Debug, Clone, Copy)]
pub(crate) struct LoopRelax;
impl Relax for LoopRelax {
    fn relax() {}
}

/// Issue the CPU's spin-wait hint.
#[derive(Default, Debug, Clone, Copy)]
pub(crate) struct SpinRelax;
impl Relax for SpinRelax {
    fn relax() {
        std::hint::spin_loop();
    }
}
