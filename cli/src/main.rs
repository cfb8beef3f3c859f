use clap::{Parser, Subcommand};
use places::config::API_BASE_ENV;
use places::render::{PlaceCard, PlaceDetail, place_cards};
use places::{
    ApiClient, ApiConfig, ApiError, AuthToken, Command as FormCommand, DEFAULT_API_BASE_URL, HttpMethod,
    HttpRequest, HttpResponse, LoginForm, PlaceId, PriceFilter, Reaction, ReviewForm, Session, Transport, dispatch,
};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use tracing_subscriber::EnvFilter;


#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("{0}")]
    Api(#[from] ApiError),
    #[error("http client setup failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("invalid place id: {0:?}")]
    InvalidPlaceId(String),
    /// A form command was refused, either locally or by the API.
    #[error("{0}")]
    Refused(String),
}

#[derive(Parser, Debug)]
#[command(name = "hbnb", about = "HBnB listings API CLI")]
struct Cli {
    #[arg(long, env = API_BASE_ENV, default_value = DEFAULT_API_BASE_URL)]
    base_url: String,

    /// Access token from `hbnb login`.
    #[arg(long, env = "HBNB_TOKEN", hide_env_values = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign in and print the access token.
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "HBNB_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// List places.
    Places {
        /// `All` or a maximum nightly price.
        #[arg(long, default_value = "All")]
        max_price: String,
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Show one place with its amenities and reviews.
    Place {
        id: String,
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Post a review (requires a token).
    Review {
        place_id: String,
        #[arg(long)]
        text: String,
        #[arg(long)]
        rating: String,
    },
}

/// `reqwest`-backed transport.
#[derive(Clone, Debug)]
struct ReqwestTransport {
    client: reqwest::Client,
}

impl Transport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        let method = match request.method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
        };
        tracing::debug!(%method, url = %request.url, authenticated = request.authorization.is_some(), "sending request");

        let mut builder = self.client.request(method, &request.url);
        if let Some(authorization) = request.authorization.as_deref() {
            builder = builder.header(AUTHORIZATION, authorization);
        }
        if let Some(body) = request.body.as_ref() {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|error| ApiError::Transport(error.to_string()))?;
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(ToOwned::to_owned);
        let body = response.text().await.map_err(|error| ApiError::Transport(error.to_string()))?;
        tracing::debug!(status, "received response");
        Ok(HttpResponse { status, content_type, body })
    }
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let transport = ReqwestTransport { client: reqwest::Client::builder().build()? };
    let api = ApiClient::new(ApiConfig::new(&cli.base_url), transport);
    let session = session_from_token(cli.token.as_deref());

    let output = match cli.command {
        Command::Login { email, password } => {
            let reaction = dispatch(&api, &session, FormCommand::Login(LoginForm { email, password })).await;
            reaction_output(reaction)?
        }
        Command::Places { max_price, json } => {
            let places = api.fetch_places(&session).await?;
            if json {
                serde_json::to_string_pretty(&places)?
            } else {
                render_cards(&place_cards(&places), PriceFilter::parse(&max_price))
            }
        }
        Command::Place { id, json } => {
            let id = PlaceId::parse(&id).ok_or(CliError::InvalidPlaceId(id))?;
            let place = api.fetch_place(&id, &session).await?;
            if json {
                serde_json::to_string_pretty(&place)?
            } else {
                render_detail(&PlaceDetail::from_place(&place))
            }
        }
        Command::Review { place_id, text, rating } => {
            let command = FormCommand::SubmitReview {
                place_id: PlaceId::parse(&place_id),
                form: ReviewForm { text, rating },
            };
            reaction_output(dispatch(&api, &session, command).await)?
        }
    };

    println!("{output}");
    Ok(())
}

fn session_from_token(raw: Option<&str>) -> Session {
    raw.and_then(AuthToken::new).map(Session::with_token).unwrap_or_default()
}

/// Terminal rendering of a command reaction. Messages and alerts are failures.
fn reaction_output(reaction: Reaction) -> Result<String, CliError> {
    match reaction {
        Reaction::SignedIn { token, .. } => Ok(token.as_str().to_owned()),
        Reaction::SignedOut => Ok("signed out".to_owned()),
        Reaction::Redirect { notice, href } => Ok(notice.unwrap_or(href)),
        Reaction::Message(text) | Reaction::Alert(text) => Err(CliError::Refused(text)),
    }
}

/// One line per card the filter admits: id, price, title.
fn render_cards(cards: &[PlaceCard], filter: PriceFilter) -> String {
    cards
        .iter()
        .filter(|card| filter.admits(card.price))
        .map(|card| format!("{}\t{}\t{}", card.id, card.data_price, card.title))
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_detail(detail: &PlaceDetail) -> String {
    let mut lines = vec![detail.title.clone()];
    if !detail.description.is_empty() {
        lines.push(detail.description.clone());
    }
    lines.push(detail.location_line.clone());
    lines.push(detail.price_line.clone());
    if detail.has_amenities() {
        lines.push("Amenities:".to_owned());
        lines.extend(detail.amenities.iter().map(|name| format!("  - {name}")));
    }
    if detail.has_reviews() {
        lines.push("Reviews:".to_owned());
        for review in &detail.reviews {
            lines.push(format!("  {}", review.byline));
            lines.push(format!("    {}", review.text));
            lines.push(format!("    {}", review.rating_line));
        }
    }
    lines.join("\n")
}
