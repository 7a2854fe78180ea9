use clap::Parser;
use futures::future::join_all;
use hearthsync::prelude::*;
use hearthsync::sync::SyncedCollection;
use serde::Serialize;
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;
use tracing::{Level, event};

type GoalView = SyncView<Goal, InMemoryBackend<Goal>, LogNotifier>;

/// Plays two household members editing the same goal list and checks that
/// both views converge.
#[derive(Parser, Debug, Clone)]
#[command(name = "hearthsync", version, about)]
pub struct Args {
    /// Number of goals alice creates
    #[arg(long, default_value_t = 6)]
    pub edits: usize,

    /// Reject every k-th mutation bob sends (0 disables)
    #[arg(long, default_value_t = 3)]
    pub fail_every: usize,

    /// Simulated backend round trip
    #[arg(long, default_value_t = 5)]
    pub latency_ms: u64,

    /// Household space both members are looking at
    #[arg(long, default_value = "home")]
    pub space: String,

    /// Print the final state as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
pub struct Report {
    pub converged: bool,
    pub rejected: usize,
    pub alice: Vec<Goal>,
    pub bob: Vec<Goal>,
}

pub struct App {
    args: Args,
}

impl App {
    pub fn new(args: Args) -> Self {
        Self { args }
    }

    pub async fn run(&self) -> std::result::Result<Report, Box<dyn Error>> {
        let config = SyncConfig::from_env();
        let latency = Duration::from_millis(self.args.latency_ms);
        let backend =
            Arc::new(InMemoryBackend::<Goal>::from_config(&config).with_latency(latency));
        let scope = ScopeFilter::Space(self.args.space.clone());

        let alice = self.mount("alice", &backend, &config, &scope).await?;
        let bob = self.mount("bob", &backend, &config, &scope).await?;

        let drafts = (1..=self.args.edits)
            .map(|n| GoalDraft::new(self.args.space.clone(), format!("Goal #{n}")));
        for draft in drafts {
            alice.create(draft).await?;
        }
        wait_for(bob.collection(), latency, |c| c.len() >= self.args.edits).await;

        // bob works through the list while alice renames the same goals
        let ids = bob.snapshot().ids();
        let mut rejected = 0;
        let bob_edits = ids.iter().enumerate().map(|(n, id)| {
            let backend = backend.clone();
            let bob = &bob;
            async move {
                if self.args.fail_every > 0 && (n + 1) % self.args.fail_every == 0 {
                    backend.fail_next(1);
                }
                bob.cycle_status(id).await
            }
        });
        let alice_edits = ids
            .iter()
            .map(|id| alice.update(id, GoalPatch::title(format!("{id} (renamed)"))));
        let (bob_results, alice_results) =
            futures::join!(join_all(bob_edits), join_all(alice_edits));
        for result in bob_results.into_iter().chain(alice_results) {
            if let Err(err) = result {
                event!(Level::WARN, error = %err, "mutation rejected");
                rejected += 1;
            }
        }

        if let Some(first) = ids.first() {
            if let Err(err) = bob.delete(first).await {
                event!(Level::WARN, error = %err, "delete rejected");
                rejected += 1;
            }
        }

        let converged = wait_for(bob.collection(), latency, |c| {
            sorted(c.snapshot().to_vec()) == sorted(alice.snapshot().to_vec())
        })
        .await;

        let report = Report {
            converged,
            rejected,
            alice: sorted(alice.snapshot().to_vec()),
            bob: sorted(bob.snapshot().to_vec()),
        };
        alice.unmount();
        bob.unmount();

        self.print(&report)?;
        Ok(report)
    }

    async fn mount(
        &self,
        label: &str,
        backend: &Arc<InMemoryBackend<Goal>>,
        config: &SyncConfig,
        scope: &ScopeFilter,
    ) -> Result<GoalView> {
        SyncView::<Goal, _, _>::builder(backend.clone(), Arc::new(LogNotifier::labeled(label)))
            .config(config.clone())
            .scope(scope.clone())
            .mount(backend.as_ref())
            .await
    }

    fn print(&self, report: &Report) -> std::result::Result<(), Box<dyn Error>> {
        if self.args.json {
            println!("{}", serde_json::to_string_pretty(report)?);
            return Ok(());
        }

        println!(
            "converged: {}  rejected mutations: {}",
            report.converged, report.rejected
        );
        for goal in &report.alice {
            println!("  {:<8} {:<12} {}", goal.id, goal.status, goal.title);
        }
        if !report.converged {
            println!("bob sees:");
            for goal in &report.bob {
                println!("  {:<8} {:<12} {}", goal.id, goal.status, goal.title);
            }
        }
        Ok(())
    }
}

fn sorted(mut goals: Vec<Goal>) -> Vec<Goal> {
    goals.sort_by(|a, b| a.id.cmp(&b.id));
    goals
}

/// Polls until `done` holds or roughly a hundred round trips have passed.
async fn wait_for(
    collection: &SyncedCollection<Goal>,
    latency: Duration,
    done: impl Fn(&SyncedCollection<Goal>) -> bool,
) -> bool {
    let step = latency.max(Duration::from_millis(1)) * 2;
    for _ in 0..100 {
        if done(collection) {
            return true;
        }
        tokio::time::sleep(step).await;
    }
    done(collection)
}
