mod cli;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let opts = cli::get_args();
    setup_logger(opts.verbose());
    log::trace!("Args: {:?}", opts);

    opts.run().await.map_err(|error| {
        log::error!("{:?}", error);
        anyhow::anyhow!("{} failed: {error}", clap::crate_name!())
    })
}

/// `-v` raises our own crates; sqlx and the HTTP stack only follow from `-vvv`.
pub(crate) fn setup_logger(level: u8) {
    let mut builder = pretty_env_logger::formatted_timed_builder();

    let (ours, dependencies) = match level {
        0 => (log::LevelFilter::Warn, log::LevelFilter::Warn),
        1 => (log::LevelFilter::Info, log::LevelFilter::Warn),
        2 => (log::LevelFilter::Debug, log::LevelFilter::Warn),
        _ => (log::LevelFilter::Trace, log::LevelFilter::Debug),
    };

    builder.filter_level(dependencies);
    for module in ["hangar", "hangar_app", "hangar_esi", "hangar_store", "hangar_core"] {
        builder.filter_module(module, ours);
    }
    builder.format_timestamp_millis();
    builder.init();
}
