use crate::core::PanelEvent;
use crate::BroadcastMessage;
use jellypanel_proto::protocol::{Broadcast, Command, Message, PROTOCOL_VERSION};
use jellypanel_proto::state::SnapshotStore;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};

pub fn start_server(
    bind_address: String,
    port: u16,
    snapshots: Arc<SnapshotStore>,
    event_tx: mpsc::Sender<PanelEvent>,
    broadcast_tx: broadcast::Sender<BroadcastMessage>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let addr = format!("{}:{}", bind_address, port);

        let listener = match TcpListener::bind(&addr).await {
            Ok(l) => l,
            Err(e) => {
                error!("Failed to bind TCP socket {}: {}", addr, e);
                return;
            }
        };

        info!("TCP server listening at {}", addr);
        serve(listener, snapshots, event_tx, broadcast_tx).await;
    })
}

/// Accept loop on an already bound listener.
pub async fn serve(
    listener: TcpListener,
    snapshots: Arc<SnapshotStore>,
    event_tx: mpsc::Sender<PanelEvent>,
    broadcast_tx: broadcast::Sender<BroadcastMessage>,
) {
    let mut client_id = 0usize;

    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                client_id += 1;
                let id = client_id;
                info!("Client {} connected from {}", id, peer);

                let snapshots = Arc::clone(&snapshots);
                let evt_tx = event_tx.clone();
                let bcast_rx = broadcast_tx.subscribe();

                tokio::spawn(async move {
                    handle_client(stream, snapshots, id, evt_tx, bcast_rx).await;
                    info!("Client {} disconnected", id);
                });
            }
            Err(e) => {
                error!("Failed to accept connection: {}", e);
            }
        }
    }
}

async fn handle_client(
    stream: TcpStream,
    snapshots: Arc<SnapshotStore>,
    client_id: usize,
    event_tx: mpsc::Sender<PanelEvent>,
    mut broadcast_rx: broadcast::Receiver<BroadcastMessage>,
) {
    let (mut read_half, mut write_half) = stream.into_split();
    let mut tmp = [0u8; 4096];
    let mut read_buf: Vec<u8> = Vec::new();

    // Hello with the current snapshot on connect
    match encode_hello(&snapshots).await {
        Ok(encoded) => {
            if write_half.write_all(&encoded).await.is_err() {
                return;
            }
        }
        Err(e) => {
            error!("Client {}: could not encode hello: {}", client_id, e);
            return;
        }
    }

    loop {
        tokio::select! {
            result = read_half.read(&mut tmp) => {
                match result {
                    Ok(0) => {
                        debug!("Client {} closed connection", client_id);
                        break;
                    }
                    Ok(n) => {
                        read_buf.extend_from_slice(&tmp[..n]);

                        while Message::frame_complete(&read_buf) {
                            match Message::decode(&read_buf) {
                                Ok((Message::Command(cmd), consumed)) => {
                                    read_buf.drain(..consumed);
                                    debug!("Client {} sent command: {:?}", client_id, cmd);

                                    if matches!(cmd, Command::GetState) {
                                        if let Ok(encoded) = encode_state(&snapshots).await {
                                            if write_half.write_all(&encoded).await.is_err() {
                                                return;
                                            }
                                        }
                                        continue;
                                    }

                                    if event_tx.send(PanelEvent::ClientCommand(cmd)).await.is_err() {
                                        warn!("PanelEvent channel closed");
                                        return;
                                    }
                                }
                                Ok((_, consumed)) => {
                                    read_buf.drain(..consumed);
                                }
                                Err(e) => {
                                    // A complete frame that does not decode will never
                                    // decode; drop the connection.
                                    warn!("Client {} sent a bad frame: {}", client_id, e);
                                    return;
                                }
                            }
                        }
                    }
                    Err(e) => {
                        error!("Read error from client {}: {}", client_id, e);
                        break;
                    }
                }
            }

            msg = broadcast_rx.recv() => {
                match msg {
                    Ok(BroadcastMessage::StateUpdated) => {
                        if let Ok(encoded) = encode_state(&snapshots).await {
                            if write_half.write_all(&encoded).await.is_err() {
                                break;
                            }
                        }
                    }
                    Ok(BroadcastMessage::Log(message)) => {
                        let broadcast = Broadcast::Log { message };
                        if let Ok(encoded) = Message::Broadcast(broadcast).encode() {
                            if write_half.write_all(&encoded).await.is_err() {
                                break;
                            }
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        // Snapshots are full state; one resend catches the client up.
                        debug!("Client {} missed {} broadcast messages", client_id, n);
                        if let Ok(encoded) = encode_state(&snapshots).await {
                            if write_half.write_all(&encoded).await.is_err() {
                                break;
                            }
                        }
                    }
                    Err(_) => break,
                }
            }
        }
    }
}

async fn encode_hello(snapshots: &SnapshotStore) -> anyhow::Result<Vec<u8>> {
    let state = snapshots.get_state().await;
    let rev = state.rev;
    Message::Broadcast(Broadcast::Hello {
        protocol_version: PROTOCOL_VERSION,
        rev,
        state,
    })
    .encode()
}

async fn encode_state(snapshots: &SnapshotStore) -> anyhow::Result<Vec<u8>> {
    let state = snapshots.get_state().await;
    Message::Broadcast(Broadcast::State { data: state }).encode()
}
