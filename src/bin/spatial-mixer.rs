//! Spatial Mixer
//!
//! Runs the routing engine on its event loop thread and serves the control
//! surface. The graph is an in-process simulation; `--demo` fills it with a
//! spatializer, a sink and two playing applications.
//!
//! Usage: `spatial-mixer [--demo] [CONFIG]`

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use spatial_mixer::{
    backend::SimulatedGraph,
    config::AppConfig,
    control::ChannelSnapshot,
    engine::{loop_channel, Engine, EventLoop, LoopInvoker, SharedSnapshots},
    registry::{props::keys, ObjectId, Properties},
    ui::{AppState, WebServer},
};

/// Nodes present before the engine starts
fn populate_graph(graph: &SimulatedGraph, config: &AppConfig) -> Result<DemoPorts> {
    let routing = &config.routing;
    let inputs = routing.filter_inputs() as u32;

    let (_, filter_inputs, _) = graph.add_node_with_ports(
        Properties::new()
            .with(keys::NODE_NAME, routing.spatializer_input.as_str())
            .with(keys::NODE_DESCRIPTION, "Spatializer"),
        inputs,
        0,
    )?;
    let (_, _, filter_outputs) = graph.add_node_with_ports(
        Properties::new().with(keys::NODE_NAME, routing.spatializer_output.as_str()),
        0,
        2,
    )?;
    let (_, sink_inputs, _) = graph.add_node_with_ports(
        Properties::new()
            .with(keys::NODE_NAME, "alsa_output.speakers")
            .with(keys::NODE_DESCRIPTION, "Speakers")
            .with(keys::MEDIA_CLASS, routing.sink_media_class.as_str()),
        2,
        0,
    )?;

    Ok(DemoPorts {
        filter_inputs,
        filter_outputs,
        sink_inputs,
    })
}

#[derive(Clone)]
struct DemoPorts {
    filter_inputs: Vec<ObjectId>,
    filter_outputs: Vec<ObjectId>,
    sink_inputs: Vec<ObjectId>,
}

/// Applications appearing once the engine runs; the second one lands on an
/// occupied slot and gets moved
fn start_demo_sources(graph: &SimulatedGraph, ports: &DemoPorts) -> Result<()> {
    for (output, input) in ports.filter_outputs.iter().zip(&ports.sink_inputs) {
        graph.link(*output, *input)?;
    }

    let (_, _, music) = graph.add_node_with_ports(
        Properties::new()
            .with(keys::NODE_NAME, "music-player")
            .with(keys::NODE_DESCRIPTION, "Music Player")
            .with(keys::MEDIA_CLASS, "Stream/Output/Audio"),
        0,
        2,
    )?;
    let (_, _, browser) = graph.add_node_with_ports(
        Properties::new()
            .with(keys::NODE_NAME, "web-browser")
            .with(keys::MEDIA_CLASS, "Stream/Output/Audio"),
        0,
        2,
    )?;

    // a session manager linking every app onto the first slot
    for outputs in [&music, &browser] {
        for (output, input) in outputs.iter().zip(&ports.filter_inputs) {
            graph.link(*output, *input)?;
        }
    }
    Ok(())
}

fn log_snapshots(invoker: &LoopInvoker, snapshots: &SharedSnapshots) {
    if invoker.barrier().is_err() {
        return;
    }
    for channel in snapshots.read().iter() {
        tracing::info!(
            "Slot {}: playing={} azimuth={:.1} radius={:.1} label={:?}",
            channel.slot,
            channel.playing,
            channel.azimuth,
            channel.radius,
            channel.label
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Spatial Mixer");

    let args: Vec<String> = std::env::args().skip(1).collect();
    let demo = args.iter().any(|arg| arg == "--demo");
    let config = match args.iter().find(|arg| !arg.starts_with("--")) {
        Some(path) => AppConfig::load(Path::new(path))?,
        None => AppConfig::load_default()?,
    };
    tracing::info!(
        "Spatializer '{}' with {} stereo slots",
        config.routing.spatializer_input,
        config.routing.slot_count
    );

    let (tx, rx) = loop_channel();
    let graph = SimulatedGraph::new(tx.clone());
    let demo_ports = if demo {
        Some(populate_graph(&graph, &config)?)
    } else {
        None
    };

    let mut engine = Engine::new(&config, graph.clone());
    let token = engine.start_sync();
    tracing::debug!("Startup sync {} pending", token);

    let (updates, _) = tokio::sync::broadcast::channel(64);
    let listener_updates = updates.clone();
    let listener = move |snapshots: &[ChannelSnapshot]| {
        // no subscribers is fine
        let _ = listener_updates.send(snapshots.to_vec());
    };
    let event_loop = EventLoop::new(engine, rx).on_state_changed(Box::new(listener));
    let handle = event_loop.spawn(tx)?;
    let invoker = handle.invoker();
    let snapshots = handle.snapshots();

    if let Some(ports) = &demo_ports {
        let invoker = invoker.clone();
        let graph = graph.clone();
        let snapshots = snapshots.clone();
        let ports = ports.clone();
        // the invoker blocks, keep it off the runtime
        tokio::task::spawn_blocking(move || -> Result<()> {
            invoker.barrier()?;
            start_demo_sources(&graph, &ports)?;
            // corrections arrive as further link events
            invoker.barrier()?;
            invoker.barrier()?;
            log_snapshots(&invoker, &snapshots);
            Ok(())
        })
        .await??;
    }

    if config.ui.enabled {
        let state = Arc::new(AppState {
            invoker: invoker.clone(),
            snapshots: snapshots.clone(),
            updates,
        });
        let _web_handle = WebServer::new(config.ui.clone(), state).start_background();
        tracing::info!(
            "Control surface at http://{}:{}",
            config.ui.bind_address,
            config.ui.http_port
        );
    }

    tracing::info!("Running - press Ctrl+C to stop");
    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");

    let engine = tokio::task::spawn_blocking(move || handle.shutdown()).await?;
    if let Some(engine) = engine {
        tracing::info!(
            "Stopped with {} cached link(s), {} parameter write(s)",
            engine.mirror().link_count(),
            graph.param_writes()
        );
    }
    Ok(())
}
