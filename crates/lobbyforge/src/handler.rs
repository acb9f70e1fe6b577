//! Per-connection handler: lifecycle reporting and message routing.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Report the connection to the lobby manager, send Welcome
//!   2. Loop: decode client messages and invoke the manager, while
//!      forwarding lobby events that concern this client's lobby
//!   3. On close, report the disconnect (via a drop guard)
//!
//! The idle deadline moves only when a frame arrives from the client, so
//! lobby traffic never keeps a silent connection open.

use std::sync::Arc;
use std::time::Instant;

use lobbyforge_lobby::{LobbyError, LobbyEvent, LobbyHandle};
use lobbyforge_protocol::{
    ClientId, ClientMessage, Codec, GameState, LobbyId, PROTOCOL_VERSION, ServerMessage,
};
use lobbyforge_transport::{Connection, WebSocketConnection};
use tokio::sync::broadcast::error::RecvError;

use crate::LobbyforgeError;
use crate::server::ServerState;

/// Drop guard that reports the disconnect when the handler exits.
///
/// Runs even if the handler errors out early. `Drop` is synchronous, so
/// the report is sent from a fire-and-forget task.
struct DisconnectGuard {
    client: ClientId,
    lobbies: LobbyHandle,
}

impl Drop for DisconnectGuard {
    fn drop(&mut self) {
        let client = self.client;
        let lobbies = self.lobbies.clone();
        tokio::spawn(async move {
            let _ = lobbies.disconnected(client).await;
        });
    }
}

/// What the handler knows about its client.
struct ClientContext {
    client: ClientId,
    /// The lobby the client was last placed in.
    lobby: Option<LobbyId>,
    start: Instant,
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<C: Codec>(
    conn: WebSocketConnection,
    state: Arc<ServerState<C>>,
) -> Result<(), LobbyforgeError> {
    let client = ClientId::from(conn.id());
    tracing::debug!(%client, "handling new connection");

    // Subscribe before anything can happen to this client's lobby.
    let mut events = state.lobbies.subscribe();
    state.lobbies.connected(client).await?;
    let _guard = DisconnectGuard {
        client,
        lobbies: state.lobbies.clone(),
    };

    let mut ctx = ClientContext {
        client,
        lobby: None,
        start: Instant::now(),
    };
    send(
        &conn,
        &state.codec,
        &ServerMessage::Welcome {
            client_id: client,
            version: PROTOCOL_VERSION,
        },
    )
    .await?;

    let idle = tokio::time::sleep(state.idle_timeout);
    tokio::pin!(idle);

    loop {
        tokio::select! {
            () = &mut idle => {
                tracing::info!(%client, "connection timed out");
                break;
            }
            received = conn.recv() => {
                let data = match received {
                    Ok(Some(data)) => data,
                    Ok(None) => {
                        tracing::info!(%client, "connection closed cleanly");
                        break;
                    }
                    Err(e) => {
                        tracing::debug!(%client, error = %e, "recv error");
                        break;
                    }
                };
                idle.as_mut().reset(tokio::time::Instant::now() + state.idle_timeout);

                let msg: ClientMessage = match state.codec.decode(&data) {
                    Ok(msg) => msg,
                    Err(e) => {
                        tracing::debug!(%client, error = %e, "failed to decode message");
                        send_error(&conn, &state.codec, 400, &format!("invalid message: {e}"))
                            .await?;
                        continue;
                    }
                };

                if handle_client_message(&conn, &state, &mut ctx, msg).await? {
                    break;
                }
            }
            event = events.recv() => match event {
                Ok(event) => forward_event(&conn, &state.codec, &mut ctx, event).await?,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(%client, skipped, "lobby events lagged, resyncing");
                    resync(&conn, &state, &mut ctx).await?;
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    let _ = conn.close().await;
    // _guard drops here → disconnect is reported.
    Ok(())
}

/// Handles one client message. Returns `true` if the connection should
/// close.
async fn handle_client_message<C: Codec>(
    conn: &WebSocketConnection,
    state: &ServerState<C>,
    ctx: &mut ClientContext,
    msg: ClientMessage,
) -> Result<bool, LobbyforgeError> {
    let client = ctx.client;
    match msg {
        ClientMessage::RequestSession => match state.lobbies.request_lobby(client).await {
            Ok(lobby) => {
                ctx.lobby = Some(lobby.lobby_id.clone());
                send(conn, &state.codec, &ServerMessage::SessionJoined { lobby }).await?;
            }
            Err(LobbyError::PoolExhausted) => {
                send_error(conn, &state.codec, 503, &LobbyError::PoolExhausted.to_string())
                    .await?;
            }
            Err(e @ LobbyError::NotFound(_)) => {
                send_error(conn, &state.codec, 404, &e.to_string()).await?;
            }
            Err(e) => return Err(e.into()),
        },

        ClientMessage::StartSession => {
            if !state.lobbies.start_lobby(client).await? {
                tracing::debug!(%client, "start request ignored");
            }
        }

        ClientMessage::SetLocked { locked } => {
            if !state.lobbies.set_locked(client, locked).await? {
                tracing::debug!(%client, locked, "lock request ignored");
            }
        }

        ClientMessage::Heartbeat { client_time } => {
            let ack = ServerMessage::HeartbeatAck {
                client_time,
                server_time: ctx.start.elapsed().as_millis() as u64,
            };
            send(conn, &state.codec, &ack).await?;
        }

        ClientMessage::Disconnect { reason } => {
            tracing::info!(%client, %reason, "client disconnected");
            return Ok(true);
        }
    }
    Ok(false)
}

/// Forwards a lobby event if it concerns the client's lobby.
async fn forward_event(
    conn: &WebSocketConnection,
    codec: &impl Codec,
    ctx: &mut ClientContext,
    event: LobbyEvent,
) -> Result<(), LobbyforgeError> {
    if ctx.lobby.as_ref() != Some(event.lobby_id()) {
        return Ok(());
    }

    let msg = match event {
        // SessionJoined already told the client about its own join.
        LobbyEvent::Joined { client, .. } if client == ctx.client => return Ok(()),
        LobbyEvent::Joined { lobby_id, client } => ServerMessage::MemberJoined { lobby_id, client },
        LobbyEvent::Left {
            lobby_id,
            client,
            owner,
        } => ServerMessage::MemberLeft {
            lobby_id,
            client,
            owner,
        },
        LobbyEvent::Started { lobby_id } => ServerMessage::SessionStarted { lobby_id },
        LobbyEvent::GameStateChanged {
            lobby_id,
            resource,
            state,
        } => ServerMessage::GameState {
            lobby_id,
            resource,
            state,
        },
        LobbyEvent::GameReady { lobby_id } => ServerMessage::GameReady { lobby_id },
        LobbyEvent::ReadinessTimedOut { .. } => ServerMessage::Error {
            code: 408,
            message: "not every member reached the game scene".to_string(),
        },
        LobbyEvent::Closed { .. } => {
            ctx.lobby = None;
            return Ok(());
        }
        LobbyEvent::Created { .. } => return Ok(()),
    };
    send(conn, codec, &msg).await
}

/// Re-sends the client's lobby snapshot after skipped events.
///
/// `SessionJoined` carries membership, owner, and the started flag. A
/// started lobby also gets its current game state, plus `GameReady` if
/// the barrier already passed.
async fn resync<C: Codec>(
    conn: &WebSocketConnection,
    state: &ServerState<C>,
    ctx: &mut ClientContext,
) -> Result<(), LobbyforgeError> {
    let Some(lobby) = state.lobbies.lobby_of(ctx.client).await? else {
        ctx.lobby = None;
        return Ok(());
    };
    let lobby_id = lobby.lobby_id.clone();
    let resource = lobby.resource;
    let started = lobby.started;
    ctx.lobby = Some(lobby_id.clone());
    send(conn, &state.codec, &ServerMessage::SessionJoined { lobby }).await?;

    if !started {
        return Ok(());
    }
    let Some(game) = state.lobbies.game_state(lobby_id.clone()).await? else {
        return Ok(());
    };
    let game_state = *game.borrow();
    send(
        conn,
        &state.codec,
        &ServerMessage::GameState {
            lobby_id: lobby_id.clone(),
            resource,
            state: game_state,
        },
    )
    .await?;
    if game_state == GameState::Ready {
        send(conn, &state.codec, &ServerMessage::GameReady { lobby_id }).await?;
    }
    Ok(())
}

async fn send(
    conn: &WebSocketConnection,
    codec: &impl Codec,
    msg: &ServerMessage,
) -> Result<(), LobbyforgeError> {
    let bytes = codec.encode(msg)?;
    conn.send(&bytes).await?;
    Ok(())
}

/// Sends a `ServerMessage::Error` to the client.
async fn send_error(
    conn: &WebSocketConnection,
    codec: &impl Codec,
    code: u16,
    message: &str,
) -> Result<(), LobbyforgeError> {
    send(
        conn,
        codec,
        &ServerMessage::Error {
            code,
            message: message.to_string(),
        },
    )
    .await
}
