use anyhow::Result;
use std::future::Future;

/// Runs `call` on consecutive slices of at most `batch_size` items, in order.
pub async fn for_each_batch<'a, T, O, F, Fut>(
    items: &'a [T],
    batch_size: usize,
    mut call: F,
) -> Result<Vec<O>>
where
    F: FnMut(&'a [T]) -> Fut,
    Fut: Future<Output = Result<O>>,
{
    let mut outputs = Vec::with_capacity(items.len().div_ceil(batch_size.max(1)));

    for batch in items.chunks(batch_size.max(1)) {
        outputs.push(call(batch).await?);
    }

    Ok(outputs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn splits_into_full_batches_and_a_remainder() {
        let texts: Vec<String> = (0..97).map(|i| format!("text {i}")).collect();
        let mut sizes = Vec::new();

        let outputs = for_each_batch(&texts, 96, |batch| {
            sizes.push(batch.len());
            let first = batch[0].clone();
            async move { Ok(first) }
        })
        .await
        .unwrap();

        assert_eq!(sizes, vec![96, 1]);
        assert_eq!(outputs, vec!["text 0", "text 96"]);
    }

    #[tokio::test]
    async fn empty_input_makes_no_calls() {
        let items: Vec<u32> = Vec::new();
        let mut calls = 0;

        let outputs = for_each_batch(&items, 32, |_| {
            calls += 1;
            async { Ok(()) }
        })
        .await
        .unwrap();

        assert_eq!(calls, 0);
        assert!(outputs.is_empty());
    }

    #[tokio::test]
    async fn stops_at_first_failing_batch() {
        let items: Vec<u32> = (0..70).collect();
        let mut calls = 0;

        let result = for_each_batch(&items, 32, |batch| {
            calls += 1;
            let fail = batch[0] == 32;
            async move {
                if fail {
                    Err(anyhow::anyhow!("Pinecone API error (400 Bad Request)"))
                } else {
                    Ok(batch.len())
                }
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls, 2);
    }
}
