use proptest::prelude::*;
use std::sync::Arc;

use bookstore::seeder::reset_and_load;
use bookstore::{Book, Bookstore, MemoryStore};

fn catalogue(n: usize) -> Vec<Book> {
    (0..n)
        .map(|i| {
            let title = format!("Book {i}");
            let year = 1900 + i32::try_from(i).unwrap();
            Book::new(&title, "Author", "Genre", year, 10.0, true, 100, "Press")
        })
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn pages_cover_every_record_once(n in 0usize..40, size in 1u64..8) {
        let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let (seen, expected) = rt.block_on(async {
            let store = Arc::new(MemoryStore::new());
            let books = catalogue(n);
            reset_and_load(&store, &books).await.unwrap();
            let bs = Bookstore::new(store);
            let mut seen = Vec::new();
            let mut page = 1;
            loop {
                let batch = bs.find_page(page, size).await.unwrap();
                assert!(batch.len() as u64 <= size);
                if batch.is_empty() {
                    break;
                }
                seen.extend(batch.into_iter().map(|b| b.title));
                page += 1;
            }
            (seen, books.into_iter().map(|b| b.title).collect::<Vec<_>>())
        });
        prop_assert_eq!(seen, expected);
    }

    #[test]
    fn sorted_prices_are_monotonic(prices in proptest::collection::vec(0u32..10_000, 0..30)) {
        use bookstore::book::fields;
        use bookstore::query::Order;
        let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let sorted = rt.block_on(async {
            let store = Arc::new(MemoryStore::new());
            let books: Vec<Book> = catalogue(prices.len())
                .into_iter()
                .zip(&prices)
                .map(|(mut b, p)| {
                    b.price = f64::from(*p) / 100.0;
                    b
                })
                .collect();
            reset_and_load(&store, &books).await.unwrap();
            Bookstore::new(store).find_sorted(fields::PRICE, Order::Desc).await.unwrap()
        });
        prop_assert_eq!(sorted.len(), prices.len());
        for w in sorted.windows(2) {
            prop_assert!(w[0].price >= w[1].price);
        }
    }
}
