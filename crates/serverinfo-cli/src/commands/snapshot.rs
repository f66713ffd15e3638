use std::time::Duration;

pub fn run(settle_ms: u64, loop_interval: Duration) {
    let (aggregator, sampler) = super::make_aggregator(loop_interval);

    let rt = super::runtime();
    let tree = rt.block_on(async {
        if let Err(e) = sampler.start() {
            super::fail(e);
        }
        tokio::time::sleep(Duration::from_millis(settle_ms)).await;
        let tree = aggregator.collect();
        sampler.stop();
        tree
    });

    match serde_json::to_string_pretty(&tree) {
        Ok(json) => println!("{json}"),
        Err(e) => super::fail(format!("cannot encode snapshot: {e}")),
    }
}
