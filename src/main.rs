// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Podsmith CLI
//!
//! Artifact store maintenance and an offline run of the full workflow
//! against the simulated site.

use std::env;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;

use podsmith::{
    hash_bytes, Artifact, ArtifactStore, AuthState, MockSite, PollConfig, SaveQrCodeToFile,
    SessionConfig, SessionManager,
};

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("podsmith=info")),
        )
        .init();

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        print_usage();
        return ExitCode::from(1);
    }

    let result = match args[1].as_str() {
        "artifacts" => {
            if args.len() < 3 {
                eprintln!("Usage: podsmith artifacts <workspace>");
                return ExitCode::from(1);
            }
            list_artifacts(Path::new(&args[2])).await
        }
        "verify" => {
            if args.len() < 3 {
                eprintln!("Usage: podsmith verify <workspace>");
                return ExitCode::from(1);
            }
            verify_store(Path::new(&args[2])).await
        }
        "hash" => {
            if args.len() < 3 {
                eprintln!("Usage: podsmith hash <file>");
                return ExitCode::from(1);
            }
            hash_file(Path::new(&args[2])).await
        }
        "auth-state" => {
            if args.len() < 3 {
                eprintln!("Usage: podsmith auth-state <file>");
                return ExitCode::from(1);
            }
            inspect_auth_state(Path::new(&args[2])).await
        }
        "simulate" => {
            if args.len() < 3 {
                eprintln!("Usage: podsmith simulate <document> [workspace]");
                return ExitCode::from(1);
            }
            let workspace = args.get(3).map(PathBuf::from);
            simulate(Path::new(&args[2]), workspace).await
        }
        "--help" | "-h" | "help" => {
            print_usage();
            return ExitCode::SUCCESS;
        }
        "--version" | "-v" | "version" => {
            println!("podsmith {}", podsmith::VERSION);
            return ExitCode::SUCCESS;
        }
        cmd => {
            eprintln!("Unknown command: {}", cmd);
            print_usage();
            return ExitCode::from(1);
        }
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(1)
        }
    }
}

fn print_usage() {
    println!(
        r#"Podsmith - Browser-Driven Podcast Generation

USAGE:
    podsmith <COMMAND> [OPTIONS]

COMMANDS:
    artifacts <workspace>             List stored artifacts
    verify <workspace>                Re-hash stored artifacts and report mismatches
    hash <file>                       Print the content hash a file would be stored under
    auth-state <file>                 Summarize a saved authentication state
    simulate <document> [workspace]   Run the whole workflow against the simulated site
    help                              Show this help message
    version                           Show version information

ENVIRONMENT:
    PODSMITH_WORKSPACE          Default workspace for simulate
    PODSMITH_REMOTE_ENDPOINT    Remote browser endpoint
    PODSMITH_HEADLESS           Launch the local browser headless (1/true/yes)
    RUST_LOG                    Log filter, defaults to podsmith=info

EXAMPLES:
    podsmith simulate paper.pdf ./workspace
    podsmith artifacts ./workspace
    podsmith verify ./workspace
"#
    );
}

async fn list_artifacts(workspace: &Path) -> anyhow::Result<ExitCode> {
    let store = ArtifactStore::for_workspace(workspace);
    let artifacts = store
        .list()
        .await
        .with_context(|| format!("listing {}", store.root().display()))?;

    if artifacts.is_empty() {
        println!("No artifacts in {}", store.root().display());
        return Ok(ExitCode::SUCCESS);
    }

    println!("=== Artifacts ({}) ===", artifacts.len());
    for artifact in &artifacts {
        println!(
            "  {}{}  {} bytes",
            artifact.content_hash, artifact.file_extension, artifact.size
        );
    }

    Ok(ExitCode::SUCCESS)
}

async fn verify_store(workspace: &Path) -> anyhow::Result<ExitCode> {
    let store = ArtifactStore::for_workspace(workspace);
    let report = store
        .verify()
        .await
        .with_context(|| format!("verifying {}", store.root().display()))?;

    println!("Checked: {}", report.checked);
    if report.is_clean() {
        println!("All artifacts match their content hash");
        return Ok(ExitCode::SUCCESS);
    }

    println!("\n=== Mismatches ({}) ===", report.mismatches.len());
    for mismatch in &report.mismatches {
        println!("  {}", mismatch.path.display());
        println!("    expected: {}", mismatch.expected);
        println!("    actual:   {}", mismatch.actual);
    }

    Ok(ExitCode::from(2))
}

async fn hash_file(path: &Path) -> anyhow::Result<ExitCode> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    println!("{}  {}", hash_bytes(&bytes), path.display());
    Ok(ExitCode::SUCCESS)
}

async fn inspect_auth_state(path: &Path) -> anyhow::Result<ExitCode> {
    let state = AuthState::load(path)
        .await
        .with_context(|| format!("loading {}", path.display()))?;
    let value = state.as_value();

    let cookies = value
        .get("cookies")
        .and_then(|c| c.as_array())
        .map(|c| c.len())
        .unwrap_or(0);
    let origins = value
        .get("origins")
        .and_then(|o| o.as_array())
        .map(|o| o.len())
        .unwrap_or(0);

    println!("=== Authentication State ===");
    println!("File: {}", path.display());
    println!("Cookies: {}", cookies);
    println!("Origins: {}", origins);

    Ok(ExitCode::SUCCESS)
}

async fn simulate(document: &Path, workspace: Option<PathBuf>) -> anyhow::Result<ExitCode> {
    let mut config = SessionConfig::from_env().poll(PollConfig::new(5, Duration::from_millis(200)));
    if let Some(workspace) = workspace {
        config.workspace = workspace;
    }

    let auth_path = config.workspace.join("auth.json");
    if auth_path.exists() {
        let state = AuthState::load(&auth_path)
            .await
            .with_context(|| format!("loading {}", auth_path.display()))?;
        config = config.auth_state(state);
    }

    let site = MockSite::default().ready_after(2);
    let qr = SaveQrCodeToFile::new(config.workspace.join("qrcode.png"));
    let mut session = SessionManager::new(site.driver(), config);

    let outcome = run_workflow(&mut session, &qr, document).await;

    qr.cleanup().await;
    if let Some(state) = session.auth_state() {
        state
            .save(&auth_path)
            .await
            .with_context(|| format!("saving {}", auth_path.display()))?;
    }
    session.destroy().await;

    match outcome {
        Ok(artifact) => {
            println!("{}", serde_json::to_string_pretty(&artifact)?);
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            eprintln!("{}", serde_json::to_string_pretty(&e.to_report())?);
            Ok(ExitCode::from(1))
        }
    }
}

async fn run_workflow(
    session: &mut SessionManager,
    qr: &SaveQrCodeToFile,
    document: &Path,
) -> podsmith::Result<Artifact> {
    session.init().await?;
    session.login(qr).await?;
    session.generate(document).await
}
