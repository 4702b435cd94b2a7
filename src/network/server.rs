//! WebSocket Game Server
//!
//! Async WebSocket server for one shared arena. Connection tasks never touch
//! the world directly: they queue [`WorldCommand`]s to a single world task
//! that owns the [`World`] and its physics, drains the queue at the start of
//! every tick, and pushes one snapshot per connection on the broadcast
//! interval.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, RwLock, broadcast};
use tokio::time::{interval, MissedTickBehavior};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use futures_util::{SinkExt, StreamExt};
use tracing::{info, warn, error, debug, instrument};

use crate::config::{ArenaConfig, Config};
use crate::core::physics::{EulerPhysics, Physics};
use crate::game::input::InputFrame;
use crate::game::session::PlayerId;
use crate::game::state::World;
use crate::game::tick::tick;
use crate::network::protocol::{
    ClientMessage, ServerMessage, ServerError, ErrorCode, InputMessage, WelcomeInfo,
};
use crate::network::snapshot::{SnapshotBuilder, SnapshotGates};

/// Game server errors.
#[derive(Debug, thiserror::Error)]
pub enum GameServerError {
    /// Failed to bind to address.
    #[error("Failed to bind: {0}")]
    BindFailed(#[from] std::io::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Session mutations queued for the world task.
#[derive(Clone, Debug, PartialEq)]
pub enum WorldCommand {
    /// A connection opened.
    Connect(PlayerId),
    /// Attach to a free core.
    Join {
        /// Player
        id: PlayerId,
        /// Requested display name
        name: String,
    },
    /// Latest held keys.
    Input {
        /// Player
        id: PlayerId,
        /// Keys and respawn flag
        frame: InputFrame,
        /// Optional name change
        name: Option<String>,
    },
    /// A connection closed.
    Disconnect(PlayerId),
}

/// Apply one queued command to the world.
pub fn apply_command(world: &mut World, physics: &mut dyn Physics, command: WorldCommand) {
    match command {
        WorldCommand::Connect(id) => {
            world.connect(id);
        }
        WorldCommand::Join { id, name } => {
            let outcome = world.join(&id, &name, physics);
            debug!(player = %id, ?outcome, "Join processed");
        }
        WorldCommand::Input { id, frame, name } => {
            world.submit_input(&id, frame, name.as_deref(), physics);
        }
        WorldCommand::Disconnect(id) => {
            world.disconnect(&id);
        }
    }
}

/// Outbound queue per live connection.
type Connections = Arc<RwLock<BTreeMap<PlayerId, mpsc::Sender<ServerMessage>>>>;

/// Everything a connection task needs.
#[derive(Clone)]
struct ConnectionContext {
    connections: Connections,
    commands: mpsc::Sender<WorldCommand>,
    shutdown_tx: broadcast::Sender<()>,
    version: String,
    safe_time: f64,
    outbound_queue: usize,
}

/// The game server.
pub struct GameServer {
    /// Server configuration.
    config: Config,
    /// Live connections.
    connections: Connections,
    /// Shutdown signal.
    shutdown_tx: broadcast::Sender<()>,
}

impl GameServer {
    /// Create a new game server.
    pub fn new(config: Config) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            config,
            connections: Arc::new(RwLock::new(BTreeMap::new())),
            shutdown_tx,
        }
    }

    /// Bind the configured address and run until shutdown.
    pub async fn run(&self) -> Result<(), GameServerError> {
        let listener = TcpListener::bind(&self.config.server.bind_addr).await?;
        self.serve(listener).await
    }

    /// Run on an already bound listener until shutdown.
    #[instrument(skip_all)]
    pub async fn serve(&self, listener: TcpListener) -> Result<(), GameServerError> {
        info!("Game server listening on {}", listener.local_addr()?);

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let (command_tx, command_rx) = mpsc::channel(self.config.server.command_queue);

        let world_handle = tokio::spawn(world_task(
            self.config.arena.clone(),
            command_rx,
            self.connections.clone(),
            self.shutdown_tx.subscribe(),
        ));

        let ctx = ConnectionContext {
            connections: self.connections.clone(),
            commands: command_tx,
            shutdown_tx: self.shutdown_tx.clone(),
            version: self.config.server.version.clone(),
            safe_time: self.config.arena.safe_time_ms,
            outbound_queue: self.config.server.outbound_queue,
        };

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            if self.connection_count().await >= self.config.server.max_connections {
                                warn!("Connection limit reached, rejecting {}", addr);
                                tokio::spawn(reject_full(stream, addr));
                                continue;
                            }

                            info!("New connection from {}", addr);
                            let ctx = ctx.clone();
                            tokio::spawn(async move {
                                if let Err(e) = serve_connection(stream, addr, ctx).await {
                                    error!("Connection {} failed: {}", addr, e);
                                }
                            });
                        }
                        Err(e) => {
                            error!("Accept error: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        world_handle
            .await
            .map_err(|e| GameServerError::Internal(format!("World task failed: {e}")))
    }

    /// Shutdown the server.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Get active connection count.
    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }
}

// =============================================================================
// WORLD TASK
// =============================================================================

/// Owns the world. Ticks physics and rules, and broadcasts snapshots.
async fn world_task(
    arena: ArenaConfig,
    mut commands: mpsc::Receiver<WorldCommand>,
    connections: Connections,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let mut physics = EulerPhysics::new();
    let mut world = World::new(arena, &mut physics);

    let tick_budget = Duration::from_secs_f64(world.config.tick_secs());
    let mut tick_interval = interval(tick_budget);
    tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut broadcast_interval =
        interval(Duration::from_millis(world.config.broadcast_interval_ms));
    broadcast_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!(
        cores = world.entities.cores().len(),
        walls = world.entities.walls().len(),
        "World started"
    );

    let mut gates = SnapshotGates::new();
    let mut last_tick = Instant::now();
    loop {
        tokio::select! {
            _ = tick_interval.tick() => {
                while let Ok(command) = commands.try_recv() {
                    apply_command(&mut world, &mut physics, command);
                }

                let started = Instant::now();
                let dt = started.duration_since(last_tick).as_secs_f64();
                last_tick = started;

                let result = tick(&mut world, &mut physics, dt);
                for event in &result.events {
                    debug!(tick = event.tick, data = ?event.data, "Game event");
                }

                let elapsed = started.elapsed();
                if elapsed > tick_budget {
                    warn!(tick = world.tick, ?elapsed, "Slow tick");
                }
            }
            _ = broadcast_interval.tick() => {
                broadcast_snapshots(&world, &connections, &mut gates).await;
            }
            _ = shutdown_rx.recv() => {
                info!(ticks = world.tick, rounds = world.round.rounds_played, "World stopped");
                break;
            }
        }
    }
}

/// One snapshot per live connection. A full queue drops the snapshot.
///
/// A dropped snapshot is not recorded as delivered, so a closing gate is
/// retried on the next broadcast.
async fn broadcast_snapshots(world: &World, connections: &Connections, gates: &mut SnapshotGates) {
    let connections = connections.read().await;
    gates.retain(|id| connections.contains_key(id));
    if connections.is_empty() {
        return;
    }

    let builder = SnapshotBuilder::new(world);
    for (id, sender) in connections.iter() {
        let snapshot = builder.build_gated(id, gates.open_for(world, id));
        if sender.try_send(ServerMessage::Snapshot(snapshot)).is_err() {
            debug!(player = %id, "Outbound queue full, snapshot dropped");
            continue;
        }
        gates.delivered(world, id);
    }
}

// =============================================================================
// CONNECTIONS
// =============================================================================

/// Tell a client the server is full, then close.
async fn reject_full(stream: TcpStream, addr: SocketAddr) {
    let Ok(mut ws) = accept_async(stream).await else {
        return;
    };
    let msg = ServerMessage::Error(ServerError::new(ErrorCode::ServerFull, "Server is full"));
    if let Ok(text) = msg.to_json() {
        let _ = ws.send(Message::Text(text)).await;
    }
    let _ = ws.close(None).await;
    debug!("Rejected {}", addr);
}

/// Decode one inbound frame into a world command.
///
/// `Ok(None)` means the frame needs no world change. `Err` carries the reply
/// for the client.
fn decode_frame(id: PlayerId, message: &Message) -> Result<Option<WorldCommand>, ServerMessage> {
    let invalid = || {
        ServerMessage::Error(ServerError::new(ErrorCode::InvalidInput, "Invalid message format"))
    };

    let input_command = |input: InputMessage| WorldCommand::Input {
        id,
        frame: input.to_input_frame(),
        name: input.name,
    };

    match message {
        Message::Text(text) => match ClientMessage::from_json(text).map_err(|_| invalid())? {
            ClientMessage::Join(join) => Ok(Some(WorldCommand::Join { id, name: join.name })),
            ClientMessage::Input(input) => Ok(Some(input_command(input))),
            ClientMessage::Ping { timestamp } => Err(ServerMessage::pong(timestamp)),
        },
        Message::Binary(data) => {
            let input = InputMessage::from_bytes(data).map_err(|_| invalid())?;
            Ok(Some(input_command(input)))
        }
        _ => Ok(None),
    }
}

#[instrument(skip(stream, ctx))]
async fn serve_connection(
    stream: TcpStream,
    addr: SocketAddr,
    ctx: ConnectionContext,
) -> Result<(), GameServerError> {
    let mut shutdown_rx = ctx.shutdown_tx.subscribe();
    let ws_stream = accept_async(stream).await?;
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();
    let (msg_tx, mut msg_rx) = mpsc::channel::<ServerMessage>(ctx.outbound_queue.max(1));

    let id = PlayerId::new();
    ctx.connections.write().await.insert(id, msg_tx.clone());
    if ctx.commands.send(WorldCommand::Connect(id)).await.is_err() {
        ctx.connections.write().await.remove(&id);
        return Err(GameServerError::Internal("World task is gone".to_string()));
    }
    info!(player = %id, "Client {} connected", addr);

    // Spawn message sender task
    let sender_task = tokio::spawn(async move {
        while let Some(msg) = msg_rx.recv().await {
            let text = match msg.to_json() {
                Ok(t) => t,
                Err(e) => {
                    error!("Failed to serialize message: {}", e);
                    continue;
                }
            };
            if ws_sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
        let _ = ws_sender.close().await;
    });

    let _ = msg_tx
        .send(ServerMessage::Welcome(WelcomeInfo {
            id,
            version: ctx.version.clone(),
            safe_time: ctx.safe_time,
        }))
        .await;

    // Handle incoming messages
    loop {
        tokio::select! {
            msg = ws_receiver.next() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => {
                        debug!("Client {} disconnected", addr);
                        break;
                    }
                    Some(Ok(message)) => match decode_frame(id, &message) {
                        Ok(Some(command)) => {
                            if ctx.commands.send(command).await.is_err() {
                                break;
                            }
                        }
                        Ok(None) => {}
                        Err(reply) => {
                            let _ = msg_tx.send(reply).await;
                        }
                    },
                    Some(Err(e)) => {
                        warn!("WebSocket error for {}: {}", addr, e);
                        break;
                    }
                }
            }
            _ = shutdown_rx.recv() => {
                let _ = msg_tx.send(ServerMessage::Shutdown {
                    reason: "Server shutting down".to_string(),
                }).await;
                break;
            }
        }
    }

    // Cleanup
    ctx.connections.write().await.remove(&id);
    let _ = ctx.commands.send(WorldCommand::Disconnect(id)).await;
    drop(msg_tx);

    let abort = sender_task.abort_handle();
    if tokio::time::timeout(Duration::from_secs(1), sender_task).await.is_err() {
        abort.abort();
    }

    info!(player = %id, "Client {} cleaned up", addr);
    Ok(())
}
