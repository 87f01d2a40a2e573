use catalog_collect::{Config, run};

fn main() -> anyhow::Result<()> {
    // `run` reports config errors itself; `init` must work with a broken file.
    let worker_threads = Config::load().map_or(0, |c| c.general.worker_threads);

    let mut builder = tokio::runtime::Builder::new_multi_thread();
    builder.enable_all().thread_name("collect-worker");
    if worker_threads > 0 {
        builder.worker_threads(worker_threads);
    }

    builder.build()?.block_on(run())
}
