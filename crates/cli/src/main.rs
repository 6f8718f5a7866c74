//! # CareCard CLI
//!
//! Command-line front-end to the CareCard core: format completion text, chat with the
//! assistant, analyse images, look up hospitals and routes, print emergency links and
//! build the health QR payload.
//!
//! Configuration comes from `CARECARD_*` environment variables, optionally loaded from a
//! `.env` file.

use std::error::Error;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use carecard_core::transcript::{paginate, transcript_text, PageLayout};
use carecard_core::{
    emergency, prompts, AnalysisKind, ChatSession, CompletionClient, CoreConfig, FormattedResponse,
    GeoPoint, HealthProfile, Hospital, HospitalFinder, HttpTransport, InlineData,
    ReqwestTransport, RetryingClient,
};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "carecard")]
#[command(about = "CareCard health assistant CLI")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Format completion text read from a file or stdin
    Format {
        /// File to read; stdin when omitted
        file: Option<PathBuf>,
        /// Print plain text instead of HTML
        #[arg(long)]
        plain: bool,
    },
    /// Ask the assistant a question, or start an interactive chat when no question is given
    Ask {
        question: Option<String>,
        /// Write the conversation transcript to this file when done
        #[arg(long)]
        export: Option<PathBuf>,
        /// Print the transcript laid out in pages when done
        #[arg(long)]
        pages: bool,
    },
    /// Analyse a skin condition, a medicine or a medical report
    Analyse {
        /// skin_remedy, medicine or report
        kind: AnalysisKind,
        #[arg(long)]
        description: Option<String>,
        /// JPEG, PNG, WebP or GIF image
        #[arg(long)]
        image: Option<PathBuf>,
    },
    /// List hospitals near a location, nearest first
    Hospitals {
        lat: f64,
        lon: f64,
        /// Search radius in metres
        #[arg(long)]
        radius: Option<u32>,
    },
    /// Print the driving route between two points
    Route {
        from_lat: f64,
        from_lon: f64,
        to_lat: f64,
        to_lon: f64,
    },
    /// Print emergency contact links and first-aid tips
    Emergency {
        #[arg(long, requires = "lon")]
        lat: Option<f64>,
        #[arg(long, requires = "lat")]
        lon: Option<f64>,
    },
    /// Print the QR payload of a health profile JSON file
    Qr { profile: PathBuf },
}

/// Main entry point for the CareCard CLI.
#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("carecard_core=warn".parse()?),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Format { file, plain }) => {
            let source = match file {
                Some(path) => fs::read_to_string(path)?,
                None => {
                    let mut text = String::new();
                    std::io::stdin().read_to_string(&mut text)?;
                    text
                }
            };
            let formatted = FormattedResponse::parse(&source);
            if plain {
                println!("{}", formatted.to_plain_text());
            } else {
                println!("{}", formatted.to_html());
            }
        }
        Some(Commands::Ask {
            question,
            export,
            pages,
        }) => {
            let cfg = config()?;
            let client = completion_client(&cfg)?;
            let cancel = cancel_on_ctrl_c();
            let mut session = ChatSession::new();

            match question {
                Some(question) => {
                    let reply = session.ask(&client, &question, Some(&cancel)).await?;
                    println!("{}", reply.plain_text());
                }
                None => {
                    let stdin = BufReader::new(tokio::io::stdin());
                    chat_loop(&client, &mut session, stdin, &cancel).await?
                }
            }

            if let Some(path) = export {
                fs::write(&path, transcript_text(session.messages()))?;
                println!("Transcript written to {}", path.display());
            }
            if pages {
                for (index, page) in paginate(session.messages(), PageLayout::default())
                    .iter()
                    .enumerate()
                {
                    println!("--- Page {} ---", index + 1);
                    for line in page {
                        println!("{line}");
                    }
                }
            }
        }
        Some(Commands::Analyse {
            kind,
            description,
            image,
        }) => {
            let cfg = config()?;
            let client = completion_client(&cfg)?;
            let image = image.as_deref().map(read_image).transpose()?;
            let reply = prompts::analyse(
                &client,
                kind,
                description.as_deref(),
                image,
                Some(&cancel_on_ctrl_c()),
            )
            .await?;
            println!("{}", reply.to_plain_text());
        }
        Some(Commands::Hospitals { lat, lon, radius }) => {
            let cfg = config()?;
            let finder = hospital_finder(&cfg);
            let hospitals = finder
                .nearby(GeoPoint::new(lat, lon)?, radius, Some(&cancel_on_ctrl_c()))
                .await?;
            if hospitals.is_empty() {
                println!("No hospitals found");
            }
            for line in hospital_lines(&hospitals) {
                println!("{line}");
            }
        }
        Some(Commands::Route {
            from_lat,
            from_lon,
            to_lat,
            to_lon,
        }) => {
            let cfg = config()?;
            let finder = hospital_finder(&cfg);
            let route = finder
                .route(
                    GeoPoint::new(from_lat, from_lon)?,
                    GeoPoint::new(to_lat, to_lon)?,
                    Some(&cancel_on_ctrl_c()),
                )
                .await?;
            if route.points.is_empty() {
                println!("No route found");
            }
            for point in route.points {
                println!("{:.6},{:.6}", point.lat, point.lon);
            }
        }
        Some(Commands::Emergency { lat, lon }) => {
            let location = match (lat, lon) {
                (Some(lat), Some(lon)) => Some(GeoPoint::new(lat, lon)?),
                _ => None,
            };
            let links = emergency::emergency_links(location)?;
            println!("Call:     {}", links.call);
            println!("SMS:      {}", links.sms);
            println!("WhatsApp: {}", links.whatsapp);
            if let Some(map) = links.location {
                println!("Location: {map}");
            }
            println!();
            for tip in emergency::first_aid_tips() {
                println!("{}: {}", tip.topic, tip.advice);
            }
        }
        Some(Commands::Qr { profile }) => {
            let profile = HealthProfile::load(&profile)?;
            profile.validate()?;
            println!("{}", profile.qr_payload()?);
        }
        None => {
            println!("Use 'carecard --help' for commands");
        }
    }

    Ok(())
}

fn config() -> Result<CoreConfig, Box<dyn Error>> {
    Ok(CoreConfig::from_lookup(|key| std::env::var(key).ok())?)
}

fn completion_client(
    cfg: &CoreConfig,
) -> Result<CompletionClient<ReqwestTransport>, Box<dyn Error>> {
    Ok(CompletionClient::new(
        RetryingClient::new(ReqwestTransport::new(), cfg.retry_policy()),
        cfg.completion()?.clone(),
    ))
}

fn hospital_finder(cfg: &CoreConfig) -> HospitalFinder<ReqwestTransport> {
    HospitalFinder::new(
        RetryingClient::new(ReqwestTransport::new(), cfg.retry_policy()),
        cfg,
    )
}

/// A token cancelled by the first Ctrl-C, so an in-flight request stops between retries.
fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let child = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            child.cancel();
        }
    });
    token
}

/// Read questions from `input` until EOF, `exit` or Ctrl-C. `clear` starts a new conversation.
///
/// Cancellation ends the loop whether it arrives at the prompt or during a request.
async fn chat_loop<T, R>(
    client: &CompletionClient<T>,
    session: &mut ChatSession,
    input: R,
    cancel: &CancellationToken,
) -> Result<(), Box<dyn Error>>
where
    T: HttpTransport,
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    eprintln!("Ask a question ('clear' to start over, 'exit' to quit)");

    loop {
        let line = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            line = lines.next_line() => line?,
        };
        let Some(line) = line else { break };

        match line.trim() {
            "" => continue,
            "exit" | "quit" => break,
            "clear" => {
                session.clear();
                eprintln!("Conversation cleared");
            }
            question => match session.ask(client, question, Some(cancel)).await {
                Ok(reply) => println!("{}\n", reply.plain_text()),
                Err(e) if cancel.is_cancelled() => {
                    eprintln!("{e}");
                    break;
                }
                Err(e) => eprintln!("Error: {e}"),
            },
        }
    }
    Ok(())
}

fn image_mime_type(path: &Path) -> Option<&'static str> {
    let extension = path.extension()?.to_str()?.to_ascii_lowercase();
    match extension.as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        _ => None,
    }
}

fn read_image(path: &Path) -> Result<InlineData, Box<dyn Error>> {
    let mime_type = image_mime_type(path)
        .ok_or_else(|| format!("unsupported image type: {}", path.display()))?;
    let bytes = fs::read(path)?;
    Ok(InlineData::from_bytes(mime_type, &bytes))
}

fn hospital_lines(hospitals: &[Hospital]) -> Vec<String> {
    hospitals
        .iter()
        .map(|h| {
            format!(
                "{:>6.2} km  {}  ({:.5}, {:.5})",
                h.distance_km, h.name, h.lat, h.lon
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use carecard_core::{CareResult, CompletionConfig, HttpRequest, HttpResponse, RetryPolicy};
    use clap::CommandFactory;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct CannedTransport {
        calls: AtomicUsize,
    }

    impl HttpTransport for CannedTransport {
        async fn execute(&self, _request: &HttpRequest) -> CareResult<HttpResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(HttpResponse {
                status: 200,
                body: br#"{"candidates":[{"content":{"parts":[{"text":"Rest."}]}}]}"#.to_vec(),
            })
        }
    }

    fn canned_client() -> CompletionClient<CannedTransport> {
        let config = CompletionConfig::new(
            "http://completion.test".into(),
            "test-model".into(),
            "key".into(),
        )
        .unwrap();
        CompletionClient::new(
            RetryingClient::new(CannedTransport::default(), RetryPolicy::new(0, 1, 2.0).unwrap()),
            config,
        )
    }

    fn calls(client: &CompletionClient<CannedTransport>) -> usize {
        client.http().transport().calls.load(Ordering::SeqCst)
    }

    #[tokio::test]
    async fn test_chat_loop_answers_until_exit() {
        let client = canned_client();
        let mut session = ChatSession::new();
        let input: &[u8] = b"What helps a headache?\n\nexit\nnever asked\n";

        chat_loop(&client, &mut session, input, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(calls(&client), 1);
        assert_eq!(session.messages().len(), 2);
        assert_eq!(session.messages()[1].plain_text(), "Rest.");
    }

    #[tokio::test]
    async fn test_chat_loop_clear_starts_over() {
        let client = canned_client();
        let mut session = ChatSession::new();
        let input: &[u8] = b"hi\nclear\n";

        chat_loop(&client, &mut session, input, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(calls(&client), 1);
        assert!(session.is_empty());
    }

    #[tokio::test]
    async fn test_chat_loop_exits_on_cancel_while_waiting_for_input() {
        let client = canned_client();
        let mut session = ChatSession::new();
        // The writer stays open, so the read never completes on its own.
        let (_writer, reader) = tokio::io::duplex(64);
        let cancel = CancellationToken::new();
        let canceller = cancel.clone();
        tokio::spawn(async move { canceller.cancel() });

        tokio::time::timeout(
            Duration::from_secs(5),
            chat_loop(&client, &mut session, BufReader::new(reader), &cancel),
        )
        .await
        .expect("chat loop should stop on cancel")
        .unwrap();

        assert_eq!(calls(&client), 0);
        assert!(session.is_empty());
    }

    #[tokio::test]
    async fn test_chat_loop_does_not_ask_after_cancel() {
        let client = canned_client();
        let mut session = ChatSession::new();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let input: &[u8] = b"hi\n";

        chat_loop(&client, &mut session, input, &cancel).await.unwrap();

        assert_eq!(calls(&client), 0);
        assert!(session.is_empty());
    }

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_analyse_kind_parses_aliases() {
        let cli = Cli::try_parse_from(["carecard", "analyse", "tablet", "--description", "x"])
            .unwrap();
        match cli.command {
            Some(Commands::Analyse { kind, .. }) => assert_eq!(kind, AnalysisKind::Medicine),
            _ => panic!("expected analyse"),
        }
    }

    #[test]
    fn test_emergency_requires_both_coordinates() {
        assert!(Cli::try_parse_from(["carecard", "emergency", "--lat", "12.9"]).is_err());
        assert!(
            Cli::try_parse_from(["carecard", "emergency", "--lat", "12.9", "--lon", "77.5"])
                .is_ok()
        );
    }

    #[test]
    fn test_image_mime_type_from_extension() {
        assert_eq!(image_mime_type(Path::new("rash.JPG")), Some("image/jpeg"));
        assert_eq!(image_mime_type(Path::new("a/b/pill.png")), Some("image/png"));
        assert_eq!(image_mime_type(Path::new("report.pdf")), None);
        assert_eq!(image_mime_type(Path::new("noext")), None);
    }

    #[test]
    fn test_read_image_rejects_unknown_type() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        fs::write(&path, "hello").unwrap();
        assert!(read_image(&path).is_err());
    }

    #[test]
    fn test_read_image_encodes_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pill.png");
        fs::write(&path, [1u8, 2, 3]).unwrap();
        let image = read_image(&path).unwrap();
        assert_eq!(image, InlineData::from_bytes("image/png", &[1, 2, 3]));
    }

    #[test]
    fn test_hospital_lines_show_distance_first() {
        let lines = hospital_lines(&[Hospital {
            name: "City Hospital".into(),
            lat: 12.97,
            lon: 77.59,
            distance_km: 1.234,
        }]);
        assert_eq!(lines, vec!["  1.23 km  City Hospital  (12.97000, 77.59000)"]);
    }
}
