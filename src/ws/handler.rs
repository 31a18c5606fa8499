//! WebSocket upgrade handler

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};

use crate::app::AppState;
use crate::game::{Intent, PlayerId, SimulationHandle, SyncEvent};
use crate::session::Session;
use crate::util::rate_limit::PlayerRateLimiter;
use crate::util::time::unix_millis;
use crate::ws::protocol::{ClientMsg, ServerMsg};

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut ws_sink, mut ws_stream) = socket.split();

    let Some((username, team)) = wait_for_hello(&mut ws_stream).await else {
        debug!("Connection closed before hello");
        return;
    };

    let session = match state.sessions.admit(&username, &team) {
        Ok(session) => session,
        Err(e) => {
            warn!(username = %username, error = %e, "Admission refused");
            let _ = send_msg(&mut ws_sink, &ServerMsg::error(e.code(), e.to_string())).await;
            return;
        }
    };
    let player_id = session.player_id;

    let welcome = ServerMsg::Welcome {
        player_id,
        tick_rate: state.simulation.tick_rate(),
        server_time: unix_millis(),
    };
    if let Err(e) = send_msg(&mut ws_sink, &welcome).await {
        error!(player_id, error = %e, "Failed to send welcome");
        state.sessions.release(player_id);
        return;
    }

    let admission = match state
        .simulation
        .admit(player_id, session.username.clone(), session.team.clone())
        .await
    {
        Ok(admission) => admission,
        Err(e) => {
            error!(player_id, error = %e, "Simulation refused player");
            state.sessions.release(player_id);
            return;
        }
    };

    info!(
        player_id,
        username = %session.username,
        team = %session.team,
        active = state.sessions.active_count(),
        "Player connected"
    );

    for event in admission.roster {
        if send_msg(&mut ws_sink, &ServerMsg::Sync(event)).await.is_err() {
            break;
        }
    }

    run_session(
        &session,
        ws_sink,
        ws_stream,
        state.simulation.clone(),
        admission.events,
    )
    .await;

    // Cleanup on disconnect
    if let Err(e) = state.simulation.remove(player_id).await {
        warn!(player_id, error = %e, "Failed to remove player from simulation");
    }
    state.sessions.release(player_id);

    info!(
        player_id,
        connected_secs = session.uptime().as_secs(),
        "Player disconnected"
    );
}

/// Read until the client sends `hello`. Anything else before it is ignored.
async fn wait_for_hello(ws_stream: &mut SplitStream<WebSocket>) -> Option<(String, String)> {
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientMsg>(&text) {
                Ok(ClientMsg::Hello { username, team }) => return Some((username, team)),
                Ok(other) => debug!(msg = ?other, "Message before hello ignored"),
                Err(e) => warn!(error = %e, "Failed to parse client message"),
            },
            Ok(Message::Close(_)) | Err(_) => return None,
            Ok(_) => {}
        }
    }
    None
}

/// Run the WebSocket session with read/write split
async fn run_session(
    session: &Session,
    mut ws_sink: SplitSink<WebSocket, Message>,
    mut ws_stream: SplitStream<WebSocket>,
    simulation: SimulationHandle,
    mut events_rx: broadcast::Receiver<SyncEvent>,
) {
    let player_id = session.player_id;
    let rate_limiter = PlayerRateLimiter::new();
    let (direct_tx, mut direct_rx) = mpsc::channel::<ServerMsg>(16);

    // Spawn writer task: simulation events and direct replies -> WebSocket
    let writer_handle = tokio::spawn(async move {
        loop {
            let msg = tokio::select! {
                direct = direct_rx.recv() => match direct {
                    Some(msg) => msg,
                    None => break,
                },
                event = events_rx.recv() => match event {
                    Ok(event) => ServerMsg::Sync(event),
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(
                            player_id,
                            lagged_count = n,
                            "Client lagged, skipping {} events", n
                        );
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        debug!(player_id, "Event channel closed");
                        break;
                    }
                },
            };

            if let Err(e) = send_msg(&mut ws_sink, &msg).await {
                debug!(player_id, error = %e, "WebSocket send failed");
                break;
            }
        }
    });

    // Reader loop: WebSocket -> simulation
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                if !rate_limiter.check_input() {
                    warn!(player_id, "Rate limited input message");
                    continue;
                }

                match serde_json::from_str::<ClientMsg>(&text) {
                    Ok(client_msg) => {
                        if !forward(player_id, client_msg, &simulation, &direct_tx).await {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(player_id, error = %e, "Failed to parse client message");
                    }
                }
            }
            Ok(Message::Binary(_)) => {
                warn!(player_id, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Ok(Message::Close(_)) => {
                info!(player_id, "Client initiated close");
                break;
            }
            Err(e) => {
                error!(player_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    writer_handle.abort();
}

/// Route one client message. Returns false once the simulation is gone.
async fn forward(
    player_id: PlayerId,
    msg: ClientMsg,
    simulation: &SimulationHandle,
    direct_tx: &mpsc::Sender<ServerMsg>,
) -> bool {
    let result = match msg {
        ClientMsg::Intent { inputs, rotation } => {
            if !rotation.is_finite() || rotation.length_squared() < 1e-6 {
                warn!(player_id, "Degenerate rotation dropped");
                return true;
            }
            let intent = Intent::from_flags(inputs, rotation.normalize());
            simulation.set_intent(player_id, intent).await
        }
        ClientMsg::Shoot { direction } => {
            if !direction.is_finite() {
                warn!(player_id, "Non-finite shot direction dropped");
                return true;
            }
            simulation.shoot(player_id, direction).await
        }
        ClientMsg::Ping { t } => {
            let _ = direct_tx.send(ServerMsg::Pong { t }).await;
            Ok(())
        }
        ClientMsg::Hello { .. } => {
            let _ = direct_tx
                .send(ServerMsg::error("already_joined", "Hello already received"))
                .await;
            Ok(())
        }
    };

    match result {
        Ok(()) => true,
        Err(e) => {
            error!(player_id, error = %e, "Simulation unavailable");
            false
        }
    }
}

/// Send a message over WebSocket
async fn send_msg(sink: &mut SplitSink<WebSocket, Message>, msg: &ServerMsg) -> Result<(), String> {
    let json = serde_json::to_string(msg).map_err(|e| e.to_string())?;
    sink.send(Message::Text(json)).await.map_err(|e| e.to_string())
}
