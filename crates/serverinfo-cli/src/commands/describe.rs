use std::time::Duration;

pub fn run(loop_interval: Duration) {
    let (aggregator, _) = super::make_aggregator(loop_interval);
    match serde_json::to_string_pretty(&aggregator.describe()) {
        Ok(json) => println!("{json}"),
        Err(e) => super::fail(format!("cannot encode descriptions: {e}")),
    }
}
