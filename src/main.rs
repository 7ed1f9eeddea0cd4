use {
    anyhow::Result,
    clap::Parser,
    sac_discrete::cli::{
        run,
        Args,
    },
};


fn main() -> Result<()> {
    run(Args::parse())
}
