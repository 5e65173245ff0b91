#![allow(unreachable_pub)]

use std::path::PathBuf;

xflags::xflags! {
    cmd meetup {
        /// JSON file holding the stored records, `meetup.json` by default
        optional -s, --store store: PathBuf
        /// TOML preferences file
        optional -c, --config config: PathBuf
        /// Grants storage access for this run
        optional --allow-storage

        /// Saves a sample organization, people, event and account
        cmd seed {}
        /// Reloads the store and prints every event with its host and guests
        cmd list {}
        /// Removes one entity from the store
        cmd delete {
            /// Class name, e.g. `Person`
            required class: String
            required id: u64
        }
    }
}
