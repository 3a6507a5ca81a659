use shardlife_kernel::{Chunk, ChunkSender, Game, Generation};

/// Read-only queries over a running [`Game`].
pub struct GameInspector;

impl GameInspector {
    /// Progress of the newest generation and the state of the dispatcher.
    pub fn summary<S: ChunkSender>(game: &Game<S>) -> GameSummary {
        let generation = game.current_generation();
        let dispatch = game.dispatch();
        GameSummary {
            generation: generation.number().unwrap_or(0),
            completed: generation.completed_chunks().len(),
            needed: generation.needed_chunks().len(),
            complete: generation.is_complete(),
            latest_complete: game.pipeline().latest_complete().and_then(Generation::number),
            owned: game.range().contents().len(),
            queued: dispatch.queued(),
            in_flight: dispatch.in_flight(),
            last_error: dispatch.last_error().map(ToString::to_string),
        }
    }

    /// One line per ring slot: generation number, progress and duration.
    pub fn ring<S: ChunkSender>(game: &Game<S>) -> Vec<String> {
        game.pipeline()
            .iter()
            .enumerate()
            .map(|(slot, generation)| {
                let number = generation
                    .number()
                    .map_or_else(|| "-".to_owned(), |n| n.to_string());
                let duration = generation
                    .duration()
                    .map_or_else(String::new, |d| format!(" {}ms", d.as_millis()));
                format!(
                    "[{slot}] gen {number} +{} -{} from {}{duration}",
                    generation.completed_chunks().len(),
                    generation.needed_chunks().len(),
                    generation.collaborators().len(),
                )
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameSummary {
    pub generation: u64,
    pub completed: usize,
    pub needed: usize,
    pub complete: bool,
    pub latest_complete: Option<u64>,
    pub owned: usize,
    pub queued: usize,
    pub in_flight: usize,
    pub last_error: Option<String>,
}

impl std::fmt::Display for GameSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "gen {} +{} -{} {} owned={} queue={} in-flight={}",
            self.generation,
            self.completed,
            self.needed,
            if self.complete { "complete" } else { "pending" },
            self.owned,
            self.queued,
            self.in_flight,
        )?;
        if let Some(error) = &self.last_error {
            write!(f, " last-error=\"{error}\"")?;
        }
        Ok(())
    }
}

/// RGBA8 pixels of `chunk`, row-major: live cells opaque black, dead cells
/// opaque white.
pub fn chunk_to_rgba(chunk: &Chunk) -> Vec<u8> {
    chunk
        .cells()
        .iter()
        .flat_map(|cell| {
            let shade = if *cell != 0 { 0 } else { 0xff };
            [shade, shade, shade, 0xff]
        })
        .collect()
}
