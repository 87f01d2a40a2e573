//! CLI module - Command-line interface for catalog-collect
//!
//! This module provides a structured CLI using clap for argument parsing.

mod commands;

use clap::{Parser, Subcommand};

/// catalog-collect - Remote catalog ingestion
/// Pulls listings from remote catalog APIs into a local catalog
#[derive(Parser)]
#[command(name = "catalog-collect")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create default config file
    #[command(alias = "--init")]
    Init,

    /// Manage collection sources
    Source {
        #[command(subcommand)]
        command: SourceCommands,
    },

    /// Manage local categories
    Category {
        #[command(subcommand)]
        command: CategoryCommands,
    },

    /// Bind remote categories to local ones
    Bind {
        #[command(subcommand)]
        command: BindCommands,
    },

    /// Show the remote taxonomy of a source with its bindings
    #[command(alias = "tax")]
    Taxonomy {
        /// Source ID or name
        source: String,
    },

    /// Run a collection
    #[command(alias = "c")]
    Collect {
        /// Source ID or name
        source: String,
        /// Content kind (video, article, actor, role, website, manga)
        kind: String,
        /// Remote category ID to restrict the listing to
        #[arg(long = "type")]
        type_id: Option<String>,
        /// Only records updated within this many hours
        #[arg(long)]
        hours: Option<u32>,
        /// Collect only these remote record IDs
        #[arg(long, value_delimiter = ',')]
        ids: Vec<String>,
        /// Remote keyword search
        #[arg(long)]
        keyword: Option<String>,
        /// Page to start at
        #[arg(long)]
        page: Option<u32>,
        /// Continue a stopped run at its stored page
        #[arg(long)]
        resume: bool,
    },

    /// Ask a running collection to stop after its current page
    Cancel {
        /// Source ID or name
        source: String,
        /// Content kind
        kind: String,
    },

    /// Show runs in progress or stopped
    #[command(alias = "st")]
    Status,

    /// Lock or unlock stored records
    Record {
        #[command(subcommand)]
        command: RecordCommands,
    },
}

#[derive(Subcommand)]
pub enum SourceCommands {
    /// Register a remote catalog
    Add {
        /// Display name
        name: String,
        /// Base API url
        url: String,
        /// Wire format (xml, json, auto)
        #[arg(long, default_value = "auto")]
        format: String,
        /// Extra query string appended to every request
        #[arg(long, default_value = "")]
        suffix: String,
        /// Download remote images into the local image directory
        #[arg(long)]
        sync_images: bool,
        /// Group merge policy (union, replace)
        #[arg(long)]
        group_merge: Option<String>,
    },
    /// List sources
    #[command(alias = "ls")]
    List,
    /// Show a source with its rules and filters
    Show {
        /// Source ID or name
        source: String,
    },
    /// Remove a source
    #[command(alias = "rm")]
    Remove {
        /// Source ID or name
        source: String,
    },
    /// Set the insert/update rules of one content kind
    Rules {
        /// Source ID or name
        source: String,
        /// Content kind
        kind: String,
        /// insertOnly, updateOnly or both
        #[arg(long)]
        mode: Option<String>,
        /// Dedup rule letters
        #[arg(long)]
        dedup: Option<String>,
        /// Merge rule letters
        #[arg(long)]
        merge: Option<String>,
    },
    /// Set record filters
    Filters {
        /// Source ID or name
        source: String,
        /// Drop records whose name contains any of these
        #[arg(long, value_delimiter = ',')]
        names: Option<Vec<String>>,
        /// Accept only these years
        #[arg(long, value_delimiter = ',')]
        years: Option<Vec<String>>,
        /// Accept only these play source labels
        #[arg(long, value_delimiter = ',')]
        play: Option<Vec<String>>,
        /// Accept only these download source labels
        #[arg(long, value_delimiter = ',')]
        down: Option<Vec<String>>,
    },
}

#[derive(Subcommand)]
pub enum CategoryCommands {
    /// Create a local category
    Add {
        /// Category name
        name: String,
        /// Parent category ID
        #[arg(long, default_value = "0")]
        parent: i32,
    },
    /// List local categories
    #[command(alias = "ls")]
    List,
}

#[derive(Subcommand)]
pub enum BindCommands {
    /// Bind a remote category to a local category
    Add {
        /// Source ID or name
        source: String,
        /// Remote category ID
        remote: String,
        /// Local category ID
        local: i32,
    },
    /// List bindings of a source
    #[command(alias = "ls")]
    List {
        /// Source ID or name
        source: String,
    },
    /// Remove a binding
    #[command(alias = "rm")]
    Remove {
        /// Source ID or name
        source: String,
        /// Remote category ID
        remote: String,
    },
}

#[derive(Subcommand)]
pub enum RecordCommands {
    /// Prevent runs from updating a record
    Lock {
        /// Record ID
        id: i32,
    },
    /// Allow runs to update a record again
    Unlock {
        /// Record ID
        id: i32,
    },
}

pub use commands::*;
