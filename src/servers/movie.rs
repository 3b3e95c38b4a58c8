//! Movie listings and ticket booking.
//!
//! Mixes immediate catalogue queries with suspending tools that simulate
//! database and payment-gateway latency. Bookings live in memory for the
//! lifetime of the process.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};
use tokio::time::sleep;

use crate::error::CallError;
use crate::mcp::binder::Arguments;
use crate::mcp::normalise::Message;
use crate::mcp::registry::{Members, Service};

/// A movie currently showing.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Movie {
    /// Catalogue ID.
    pub id: u32,
    /// Title.
    pub title: &'static str,
    /// Daily show times, `HH:MM`.
    pub show_times: Vec<&'static str>,
    /// Ticket price.
    pub price: f64,
}

/// A confirmed booking.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    /// Booking reference, `BK<unix seconds><movie id>`.
    pub booking_id: String,
    /// Booked movie.
    pub movie_id: u32,
    /// Booked movie's title.
    pub movie_title: String,
    /// Show time.
    pub show_time: String,
    /// Number of seats.
    pub num_tickets: u32,
    /// Total charged.
    pub total_price: f64,
    /// Confirmation address.
    pub customer_email: String,
    /// RFC 3339 timestamp of the booking.
    pub booked_at: String,
}

fn catalogue() -> Vec<Movie> {
    vec![
        Movie {
            id: 1,
            title: "Avengers: Endgame",
            show_times: vec!["10:00", "13:30", "17:00", "20:30"],
            price: 12.99,
        },
        Movie {
            id: 2,
            title: "The Matrix Resurrections",
            show_times: vec!["11:00", "14:00", "18:30", "21:00"],
            price: 11.99,
        },
        Movie {
            id: 3,
            title: "Dune",
            show_times: vec!["10:30", "13:00", "16:30", "20:00"],
            price: 12.99,
        },
        Movie {
            id: 4,
            title: "No Time to Die",
            show_times: vec!["11:30", "15:00", "18:00", "21:30"],
            price: 13.99,
        },
    ]
}

/// Movie catalogue with an in-memory booking store.
#[derive(Debug)]
pub struct MovieServer {
    movies: Vec<Movie>,
    bookings: Mutex<HashMap<String, Booking>>,
    /// Makes booking IDs unique within one second.
    sequence: AtomicU64,
}

impl Default for MovieServer {
    fn default() -> Self {
        Self::new()
    }
}

impl MovieServer {
    /// Creates the server with the built-in catalogue.
    #[must_use]
    pub fn new() -> Self {
        Self {
            movies: catalogue(),
            bookings: Mutex::new(HashMap::new()),
            sequence: AtomicU64::new(1),
        }
    }

    /// The movie with `id`, if showing.
    #[must_use]
    pub fn movie(&self, id: u32) -> Option<&Movie> {
        self.movies.iter().find(|m| m.id == id)
    }

    /// Movies matching a title fragment and price range. Every filter is optional.
    #[must_use]
    pub fn search(
        &self,
        title: Option<&str>,
        min_price: Option<f64>,
        max_price: Option<f64>,
    ) -> Vec<&Movie> {
        let title = title.map(str::to_lowercase);
        self.movies
            .iter()
            .filter(|m| {
                title
                    .as_deref()
                    .map_or(true, |t| m.title.to_lowercase().contains(t))
            })
            .filter(|m| min_price.map_or(true, |min| m.price >= min))
            .filter(|m| max_price.map_or(true, |max| m.price <= max))
            .collect()
    }

    fn store(&self, booking: Booking) -> Result<(), CallError> {
        self.bookings
            .lock()
            .map_err(|_| CallError::msg("booking store is unavailable"))?
            .insert(booking.booking_id.clone(), booking);
        Ok(())
    }

    /// Looks up a booking by reference.
    ///
    /// # Errors
    ///
    /// Returns an error if the booking store is unavailable.
    pub fn booking(&self, booking_id: &str) -> Result<Option<Booking>, CallError> {
        Ok(self
            .bookings
            .lock()
            .map_err(|_| CallError::msg("booking store is unavailable"))?
            .get(booking_id)
            .cloned())
    }

    async fn book(self: Arc<Self>, args: Arguments) -> Result<Booking, CallError> {
        let movie_id: u32 = args.get("movie_id")?;
        let show_time: String = args.get("show_time")?;
        let num_tickets: u32 = args.get("num_tickets")?;
        let customer_email: String = args.get("customer_email")?;

        if movie_id == 0
            || show_time.trim().is_empty()
            || num_tickets == 0
            || !customer_email.contains('@')
        {
            return Err(CallError::msg("Invalid booking parameters"));
        }

        let movie = self
            .movie(movie_id)
            .ok_or_else(|| CallError::msg(format!("Movie with ID {movie_id} not found")))?;
        if !movie.show_times.contains(&show_time.as_str()) {
            return Err(CallError::msg(format!(
                "Show time {show_time} not available for {}",
                movie.title
            )));
        }

        tracing::info!(movie = movie.title, show_time = %show_time, "Checking seat availability");
        sleep(Duration::from_millis(40)).await;

        tracing::info!(tickets = num_tickets, "Processing payment");
        sleep(Duration::from_millis(60)).await;

        let now = Utc::now();
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        let booking = Booking {
            booking_id: format!("BK{}{sequence:04}{movie_id}", now.timestamp()),
            movie_id,
            movie_title: movie.title.to_string(),
            show_time,
            num_tickets,
            total_price: f64::from(num_tickets) * movie.price,
            customer_email,
            booked_at: now.to_rfc3339(),
        };
        self.store(booking.clone())?;

        tracing::info!(booking = %booking.booking_id, "Booking confirmed");
        Ok(booking)
    }

    async fn search_local(&self, query: &str) -> Vec<Value> {
        sleep(Duration::from_millis(10)).await;
        self.search(Some(query), None, None)
            .into_iter()
            .map(|m| json!(m))
            .collect()
    }

    async fn search_external(query: &str) -> Vec<Value> {
        sleep(Duration::from_millis(80)).await;
        vec![
            json!({"id": "ext_1", "title": format!("External Movie: {query}"), "source": "external_api"}),
            json!({"id": "ext_2", "title": format!("Similar to {query}"), "source": "external_api"}),
        ]
    }

    async fn recommendations(query: &str) -> Vec<Value> {
        sleep(Duration::from_millis(50)).await;
        vec![
            json!({"id": "rec_1", "title": format!("Recommended: {query} 2"), "source": "recommendations"}),
            json!({"id": "rec_2", "title": format!("You might like: {query} Redux"), "source": "recommendations"}),
        ]
    }
}

impl Service for MovieServer {
    fn instructions(&self) -> String {
        "This server provides movie information and ticket booking capabilities. \
         You can list movies, search them and book tickets."
            .to_string()
    }

    #[allow(clippy::too_many_lines)]
    fn register(members: &mut Members<Self>) {
        members
            .member("tool_get_movies", |movies, _| Ok(movies.movies.clone()))
            .doc("Get a list of movies currently playing in theaters.");

        members
            .member("tool_get_showtimes", |movies, args| {
                let movie_id: u32 = args.get("movie_id")?;
                Ok(movies
                    .movie(movie_id)
                    .map(|m| m.show_times.clone())
                    .unwrap_or_default())
            })
            .doc("Get showtimes for a specific movie.\n\nReturns an empty list for unknown movies.")
            .param::<u32>("movie_id");

        members
            .member("tool_search_movies", |movies, args| {
                let title: Option<String> = args.get("title")?;
                let min_price: Option<f64> = args.get("min_price")?;
                let max_price: Option<f64> = args.get("max_price")?;
                Ok(movies
                    .search(title.as_deref(), min_price, max_price)
                    .into_iter()
                    .cloned()
                    .collect::<Vec<_>>())
            })
            .doc("Search for movies by title and/or price range.\n\nTitle matching is a case-insensitive substring match.")
            .param_default("title", None::<String>)
            .param_default("min_price", None::<f64>)
            .param_default("max_price", None::<f64>);

        members
            .member_async("tool_get_movie_details_async", |movies, args| async move {
                let movie_id: u32 = args.get("movie_id")?;
                sleep(Duration::from_millis(50)).await;
                let movie = movies
                    .movie(movie_id)
                    .ok_or_else(|| CallError::msg(format!("Movie with ID {movie_id} not found")))?;
                sleep(Duration::from_millis(30)).await;

                let mut details = json!(movie);
                if let Some(obj) = details.as_object_mut() {
                    obj.insert("director".into(), json!("Sample Director"));
                    obj.insert("genre".into(), json!(["Action", "Adventure"]));
                    obj.insert("rating".into(), json!("PG-13"));
                    obj.insert(
                        "description".into(),
                        json!(format!("This is the description for {}", movie.title)),
                    );
                    obj.insert("retrievedAt".into(), json!(Utc::now().to_rfc3339()));
                }
                Ok(details)
            })
            .doc("Get detailed information about a specific movie (asynchronous).")
            .param::<u32>("movie_id");

        members
            .member_async("tool_book_ticket_async", Self::book)
            .doc(
                "Book movie tickets for a specific showing (asynchronous with payment processing).

                Args:
                    movie_id: ID of the movie to book
                    show_time: Show time (e.g., '14:30')
                    num_tickets: Number of tickets to book
                    customer_email: Customer email for booking confirmation",
            )
            .param::<u32>("movie_id")
            .param::<String>("show_time")
            .param::<u32>("num_tickets")
            .param::<String>("customer_email");

        members
            .member_async("tool_get_booking_async", |movies, args| async move {
                let booking_id: String = args.get("booking_id")?;
                sleep(Duration::from_millis(20)).await;
                movies
                    .booking(&booking_id)?
                    .ok_or_else(|| CallError::msg(format!("Booking {booking_id} not found")))
            })
            .doc("Retrieve booking details by booking ID (asynchronous).")
            .param::<String>("booking_id");

        members
            .member_async("tool_search_movies_async", |movies, args| async move {
                let query: String = args.get("query")?;
                let query = query.trim().to_lowercase();
                if query.is_empty() {
                    return Err(CallError::msg("Search query cannot be empty"));
                }

                let (local, external, recommended) = tokio::join!(
                    movies.search_local(&query),
                    Self::search_external(&query),
                    Self::recommendations(&query),
                );

                Ok(json!({
                    "query": query,
                    "totalResults": local.len() + external.len(),
                    "localMatches": local,
                    "externalMatches": external,
                    "recommendations": recommended,
                }))
            })
            .doc("Search for movies by title (asynchronous, querying several sources concurrently).")
            .param::<String>("query");

        members
            .member("prompt_movie_night", |movies, args| {
                let guests: u32 = args.get("guests")?;
                let genre: String = args.get("genre")?;
                let titles: Vec<&str> = movies.movies.iter().map(|m| m.title).collect();
                Ok(json!({
                    "messages": [
                        Message::system("You are a friendly cinema concierge."),
                        Message::user(format!(
                            "Plan a movie night for {guests} people who enjoy {genre}. \
                             Pick from: {}.",
                            titles.join(", ")
                        )),
                    ],
                    "metadata": {"catalogueSize": titles.len()},
                }))
            })
            .doc(
                "Plan a movie night from the current listings.
                Categories: entertainment, planning",
            )
            .param_default("guests", 2_u32)
            .param_default("genre", "action");

        members
            .member("prompt_booking_help", |_, args| {
                let booking_id: String = args.get("booking_id")?;
                Ok(format!(
                    "I need help with booking {booking_id}. Look it up and explain its details."
                ))
            })
            .doc("Ask for help with an existing booking.\n[category: support]")
            .param::<String>("booking_id");
    }
}
