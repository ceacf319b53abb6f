#[cfg(not(target_arch = "wasm32"))]
fn main() -> anyhow::Result<()> {
    flow_melee::arena::run_arena()
}

// The browser enters through `flow_melee::start`.
#[cfg(target_arch = "wasm32")]
fn main() {}
