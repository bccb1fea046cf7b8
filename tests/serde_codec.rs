//! Exercises a realistic `Codec` built on `serde`/`serde_cbor`, the shape most embedders reach
//! for rather than hand-rolling byte layouts (`indexed_kv::codec::Codec` itself stays
//! serialization-agnostic; this is the client side of that contract).

use indexed_kv::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct Article {
    slug: String,
    author: String,
    views: i64,
}

struct ArticleCodec {
    indices: Vec<IndexDef<Article>>,
}

impl ArticleCodec {
    fn new() -> Self {
        ArticleCodec {
            indices: vec![
                IndexDef::unique("slug", |a: &Article| {
                    Key::compose(&[KeyPart::Str(a.slug.clone())]).unwrap()
                }),
                IndexDef::multi("author", |a: &Article| {
                    Key::compose(&[KeyPart::Str(a.author.clone())]).unwrap()
                }),
            ],
        }
    }
}

impl Codec for ArticleCodec {
    type Item = Article;

    fn encode(&self, data: &Self::Item, _primary_key: Option<&Key>) -> Vec<u8> {
        serde_cbor::to_vec(data).expect("Article always serializes")
    }

    fn decode(&self, bytes: &[u8], _primary_key: Option<&Key>) -> indexed_kv::Result<Self::Item> {
        serde_cbor::from_slice(bytes).map_err(StoreError::backend)
    }

    fn indices(&self) -> &[IndexDef<Self::Item>] {
        &self.indices
    }
}

#[test]
fn insert_query_and_update_through_a_serde_codec() {
    let store = Store::open(MemoryBackend::new(), StoreConfig::new()).unwrap();
    let articles = store.collection("articles", ArticleCodec::new()).unwrap();

    articles
        .insert(Article { slug: "a".into(), author: "priya".into(), views: 10 })
        .unwrap();
    articles
        .insert(Article { slug: "b".into(), author: "priya".into(), views: 5 })
        .unwrap();
    articles
        .insert(Article { slug: "c".into(), author: "sam".into(), views: 20 })
        .unwrap();

    let priya_lo = Key::compose(&[KeyPart::Str("priya".into())]).unwrap();
    let priya_hi = priya_lo.clone();
    assert_eq!(articles.count("author", &priya_lo, &priya_hi).unwrap(), 2);

    let pk = Key::compose(&[KeyPart::Str("a".into())]).unwrap();
    let mut article = articles.read(&pk).unwrap().unwrap();
    article.views += 1;
    articles.update(article).unwrap();

    let reread = articles.read(&pk).unwrap().unwrap();
    assert_eq!(reread.views, 11);

    let mut cursor = articles
        .query("slug", Key::START, Key::END, 0, None, false, 1)
        .unwrap();
    let mut slugs = Vec::new();
    while cursor.has_next() {
        slugs.push(cursor.next().unwrap().slug);
    }
    assert_eq!(slugs, vec!["a", "b", "c"]);
}
