//! CLI tool for inspecting geometry wire buffers
//!
//! Usage:
//!   cargo run --bin wire_inspect -- <buffer_file> [options]
//!
//! Options:
//!   --base64      Input file holds base64 text instead of raw bytes
//!   --verbose     Include the decoded payload in the output
//!   --sample      Ignore the input and print a base64 cube mesh envelope

use std::env;
use std::fs;

use base64::{engine::general_purpose, Engine as _};
use serde_json::json;

use geobridge::codec::{decode_any, encode, Payload};
use geobridge::geometry::{Mesh, Vec3};
use geobridge::init_logging;

fn sample_cube() -> Mesh {
    Mesh::from_quads(
        vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(1.0, 1.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::new(0.0, 0.0, 1.0),
            Vec3::new(1.0, 0.0, 1.0),
            Vec3::new(1.0, 1.0, 1.0),
            Vec3::new(0.0, 1.0, 1.0),
        ],
        vec![
            [0, 3, 2, 1],
            [4, 5, 6, 7],
            [0, 1, 5, 4],
            [1, 2, 6, 5],
            [2, 3, 7, 6],
            [3, 0, 4, 7],
        ],
    )
}

fn summarize(payload: &Payload, byte_len: usize, verbose: bool) -> serde_json::Value {
    let kind = payload.kind();
    let mut summary = json!({
        "bytes": byte_len,
        "tag": kind.tag(),
        "kind": kind.table_name(),
        "elements": payload.element_count(),
    });

    if let Payload::Mesh(mesh) = payload {
        let (min, max) = mesh.bounding_box();
        summary["mesh"] = json!({
            "vertices": mesh.vertex_count(),
            "triangles": mesh.triangle_faces.len(),
            "quads": mesh.quad_faces.len(),
            "bounds": [min.to_array(), max.to_array()],
        });
    }
    if let Payload::NestedIntArray(arrays) = payload {
        summary["inner_lengths"] = json!(arrays.iter().map(Vec::len).collect::<Vec<_>>());
    }
    if verbose {
        summary["payload"] = serde_json::to_value(payload).unwrap_or(serde_json::Value::Null);
    }
    summary
}

fn main() -> Result<(), anyhow::Error> {
    init_logging();
    let args: Vec<String> = env::args().collect();

    let mut input_path: Option<String> = None;
    let mut base64_input = false;
    let mut verbose = false;
    let mut sample = false;

    for arg in args.iter().skip(1) {
        match arg.as_str() {
            "--base64" => base64_input = true,
            "--verbose" => verbose = true,
            "--sample" => sample = true,
            other if !other.starts_with("--") => input_path = Some(other.to_string()),
            other => eprintln!("Ignoring unknown option {}", other),
        }
    }

    if sample {
        println!("{}", general_purpose::STANDARD.encode(encode(&sample_cube())));
        return Ok(());
    }

    let Some(input_path) = input_path else {
        eprintln!("Usage: {} <buffer_file> [options]", args[0]);
        eprintln!();
        eprintln!("Options:");
        eprintln!("  --base64    Input file holds base64 text");
        eprintln!("  --verbose   Include the decoded payload");
        eprintln!("  --sample    Print a base64 sample mesh envelope");
        eprintln!();
        eprintln!("Examples:");
        eprintln!("  {} --sample > cube.b64", args[0]);
        eprintln!("  {} cube.b64 --base64 --verbose", args[0]);
        return Ok(());
    };

    let raw = fs::read(&input_path)
        .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", input_path, e))?;
    let bytes = if base64_input {
        let text = String::from_utf8(raw)?;
        general_purpose::STANDARD
            .decode(text.trim())
            .map_err(|e| anyhow::anyhow!("Invalid base64 in {}: {}", input_path, e))?
    } else {
        raw
    };

    match decode_any(&bytes) {
        Ok(payload) => {
            println!("{}", serde_json::to_string_pretty(&summarize(&payload, bytes.len(), verbose))?);
            Ok(())
        }
        Err(err) => {
            println!("{}", serde_json::to_string_pretty(&json!({
                "bytes": bytes.len(),
                "error": err.to_string(),
            }))?);
            Err(anyhow::anyhow!("{} is not a valid geometry buffer", input_path))
        }
    }
}
