//! tandem-sim: drives simulated replicas against an in-process hub.
//!
//! Every round each replica edits, undoes or redoes at random, submits
//! through encoded protocol messages and receives the round's broadcast
//! records in shuffled order. Replicas occasionally lose a reply or drop
//! offline and catch up with a `CatchUp` request. At the end all replicas
//! flush and the final texts are compared with the hub's head.

use std::sync::Arc;

use clap::Parser;
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tandem_collab::{
    CollabError, DocumentHub, HistoryMode, MessageType, Result, ServerConfig, ServerRecord,
    Service, ServiceConfig, SyncMessage,
};
use tandem_core::text::char_len;
use tandem_core::Changeset;
use tokio::sync::broadcast;
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "tandem-sim")]
#[command(about = "Simulated collaborative editing session", long_about = None)]
struct Args {
    /// Number of replicas editing the document
    #[arg(short, long, default_value_t = 4)]
    replicas: usize,

    /// Rounds of edits before the final flush
    #[arg(short = 'n', long, default_value_t = 200)]
    rounds: usize,

    /// RNG seed; the same seed replays the same session
    #[arg(short, long, default_value_t = 7)]
    seed: u64,

    /// Probability that a replica skips a round's deliveries and catches up later
    #[arg(long, default_value_t = 0.05)]
    offline_rate: f64,

    /// Probability that the reply to a submission is lost
    #[arg(long, default_value_t = 0.1)]
    lost_reply_rate: f64,

    /// Server record retention (small values exercise compaction)
    #[arg(long, default_value_t = 64)]
    retention: usize,
}

struct Replica {
    service: Service,
    rx: broadcast::Receiver<Arc<ServerRecord>>,
    offline: bool,
}

impl Replica {
    fn edit(&mut self, rng: &mut StdRng) -> Result<()> {
        let len = char_len(self.service.view_text());
        match rng.gen_range(0..10) {
            0 => {
                self.service.undo()?;
            }
            1 => {
                self.service.redo()?;
            }
            2..=4 if len > 0 => {
                let start = rng.gen_range(0..len);
                let end = (start + rng.gen_range(1..4)).min(len);
                let typing = Changeset::deletion(len, start, end)?;
                self.service.add_local_typing(&typing, None, HistoryMode::Yes)?;
            }
            _ => {
                let at = rng.gen_range(0..=len);
                let word = ["a", "to", "the", "sync", " ", "\n", "ü"]
                    .choose(rng)
                    .copied()
                    .unwrap_or("a");
                let typing = Changeset::insertion(len, at, word)?;
                let mode = if rng.gen_bool(0.5) {
                    HistoryMode::Merge
                } else {
                    HistoryMode::Yes
                };
                self.service.add_local_typing(&typing, None, mode)?;
            }
        }
        Ok(())
    }

    /// Submits pending changes. Returns false when nothing was sent.
    async fn push(&mut self, hub: &DocumentHub, doc_id: Uuid, lose_reply: bool) -> Result<bool> {
        let Some(submitted) = self.service.submit_changes() else {
            return Ok(false);
        };
        let request = SyncMessage::submit(self.service.author_id(), doc_id, &submitted)?;
        let reply = SyncMessage::decode(&hub.handle_message(&request.encode()?).await?)?;

        match reply.msg_type {
            MessageType::Error => {
                return Err(CollabError::InvalidState(reply.error_message()?));
            }
            // The broadcast copy doubles as the acknowledgement.
            _ if lose_reply => debug!("lost reply for {}", submitted.id),
            _ => self
                .service
                .submitted_changes_acknowledged(&reply.server_record()?)?,
        }
        Ok(true)
    }

    fn receive(&mut self, rng: &mut StdRng) -> Result<()> {
        let mut records = Vec::new();
        while let Ok(record) = self.rx.try_recv() {
            records.push(record);
        }
        if self.offline {
            return Ok(());
        }
        records.shuffle(rng);
        for record in &records {
            self.service.add_external_typing(record)?;
        }
        Ok(())
    }

    async fn reconnect(&mut self, hub: &DocumentHub, doc_id: Uuid) -> Result<()> {
        self.offline = false;
        let request =
            SyncMessage::catch_up(self.service.author_id(), doc_id, self.service.server_revision())?;
        let reply = SyncMessage::decode(&hub.handle_message(&request.encode()?).await?)?;
        if reply.msg_type == MessageType::Error {
            // Fell behind the retained history: start over from the head.
            warn!(
                "replica {} cannot catch up ({}), resetting",
                self.service.author_id(),
                reply.error_message()?
            );
            self.service.reset(&hub.head(doc_id).await?);
            return Ok(());
        }
        let records = reply.server_records()?;
        info!(
            "replica {} caught up {} record(s)",
            self.service.author_id(),
            records.len()
        );
        for record in &records {
            self.service.add_external_typing(record)?;
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    info!("starting session: {:?}", args);

    let offline_rate = args.offline_rate.clamp(0.0, 1.0);
    let lost_reply_rate = args.lost_reply_rate.clamp(0.0, 1.0);
    let mut rng = StdRng::seed_from_u64(args.seed);
    let hub = DocumentHub::new(ServerConfig {
        record_retention_limit: args.retention,
        cleanup_threshold: (args.retention / 4).max(1),
        ..ServerConfig::default()
    });
    let doc_id = Uuid::new_v4();
    hub.open_document(doc_id).await;

    let mut replicas = Vec::with_capacity(args.replicas);
    for _ in 0..args.replicas {
        replicas.push(Replica {
            service: Service::new(Uuid::new_v4(), ServiceConfig::default()),
            rx: hub.subscribe(doc_id).await?,
            offline: false,
        });
    }

    for round in 0..args.rounds {
        let mut order: Vec<usize> = (0..replicas.len()).collect();
        order.shuffle(&mut rng);

        for &i in &order {
            let replica = &mut replicas[i];
            if replica.offline && rng.gen_bool(0.3) {
                replica.reconnect(&hub, doc_id).await?;
            } else if !replica.offline && rng.gen_bool(offline_rate) {
                info!("replica {} went offline in round {}", replica.service.author_id(), round);
                replica.offline = true;
            }

            replica.edit(&mut rng)?;
            if !replica.offline {
                let lose_reply = rng.gen_bool(lost_reply_rate);
                replica.push(&hub, doc_id, lose_reply).await?;
            }
        }

        for replica in &mut replicas {
            replica.receive(&mut rng)?;
        }
    }

    // Flush: everyone reconnects and submits until nothing is pending.
    for replica in &mut replicas {
        replica.reconnect(&hub, doc_id).await?;
    }
    for pass in 0.. {
        for replica in &mut replicas {
            replica.push(&hub, doc_id, false).await?;
        }
        for replica in &mut replicas {
            replica.receive(&mut rng)?;
        }
        let idle = replicas
            .iter()
            .all(|r| !r.service.have_local() && !r.service.have_submitted());
        if idle {
            break;
        }
        if pass > 2 * args.replicas {
            warn!("flush did not settle after {} passes", pass);
            break;
        }
    }

    let head = hub.head(doc_id).await?;
    let stats = hub.stats().await;
    let diverged = replicas
        .iter()
        .filter(|r| r.service.view_text() != head.text || r.service.have_submitted())
        .count();

    println!("revision:      {}", head.revision);
    println!("text length:   {}", char_len(&head.text));
    println!("records:       {}", stats.records_created);
    println!("duplicates:    {}", stats.duplicates);
    println!("messages:      {}", stats.messages);
    println!("tail:          {}", hub.facade(doc_id).await?.tail_revision());
    if diverged == 0 {
        println!("converged:     all {} replicas", replicas.len());
        Ok(())
    } else {
        Err(CollabError::InvalidState(format!(
            "{} of {} replicas diverged",
            diverged,
            replicas.len()
        )))
    }
}
