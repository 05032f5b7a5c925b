//! Decode report printing

use anyhow::Result;
use canfd_wave_decoder::{BitString, DecodedFrame, EnviMessage};
use serde::Serialize;

#[derive(Serialize)]
struct JsonReport<'a> {
    #[serde(flatten)]
    frame: &'a DecodedFrame,
    sample_times: Vec<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    payload: Option<&'a EnviMessage>,
}

/// Print the packet fields, the raw bit buffer and the payload message
pub fn print_text(frame: &DecodedFrame, payload: Option<&EnviMessage>) {
    println!("===== Decoded fields =====");
    print!("{}", frame.packet);

    println!("===== Raw bit buffer =====");
    let raw: BitString = frame.samples.iter().map(|s| s.value).collect();
    println!("{}", raw);
    println!(
        "{} bits sampled, {} edge(s) detected",
        frame.samples.len(),
        frame.edges.len()
    );

    if let Some(message) = payload {
        println!("===== Payload =====");
        print!("{}", message);
    }
}

/// Print the whole report as pretty JSON
pub fn print_json(frame: &DecodedFrame, payload: Option<&EnviMessage>) -> Result<()> {
    let report = JsonReport {
        frame,
        sample_times: frame.sample_times(),
        payload,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
