mod bucket;
mod item;
mod key;

pub use self::bucket::{Bucket, BucketId};
pub use self::item::{CheckStatus, Item, ItemState, Mergeable, ReviewDecision};
pub use self::key::CollectionKey;

fn sanitize(s: impl AsRef<str>) -> String {
    s.as_ref().trim().to_lowercase().replace('-', "").replace('_', "").replace(' ', "")
}
