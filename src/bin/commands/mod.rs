pub mod bench_cmd;
pub mod inspect_cmd;
pub mod lookup_cmd;

pub use bench_cmd::cmd_bench;
pub use inspect_cmd::cmd_inspect;
pub use lookup_cmd::cmd_lookup;
