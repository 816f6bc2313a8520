// Plangate Kernel
//
// Decision engine for infrastructure change plans: structural diffing,
// sensitive-value masking, address paths and regex policy matching.
// Pure and synchronous; all I/O belongs to callers.

pub mod check;
pub mod diff;
pub mod evaluate;
pub mod plan;
pub mod policy;
pub mod tree;
