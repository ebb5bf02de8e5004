use anyhow::Result;
use futures::StreamExt;
use ironstream::testing::{assert_stream_fails, assert_stream_yields};
use ironstream::{
    from_iter, map_transform, merge, pipe, run, wrap_sink, wrap_transform, Sink, Source, StreamError, StreamOptions,
    Transform,
};
use std::convert::Infallible;
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn add(n: i32) -> Transform<i32, i32> {
    map_transform(move |x: i32| Ok::<_, Infallible>(x + n))
}

fn failing() -> Transform<i32, i32> {
    Transform::from_stream_fn(|inbox| {
        inbox
            .take(1)
            .map(|_| Err(StreamError::composition("Test error")))
    })
}

fn collecting_sink(store: Arc<Mutex<Vec<i32>>>) -> Sink<i32> {
    Sink::for_each(move |x| store.lock().map(|mut s| s.push(x)).map_err(|e| e.to_string()))
}

#[tokio::test]
async fn source_merge_transform_is_a_source() -> Result<()> {
    let source = from_iter(1..=3).merge(add(10));
    assert_stream_yields(source, vec![11, 12, 13]).await;
    Ok(())
}

#[tokio::test]
async fn pipe_returns_the_downstream() -> Result<()> {
    let downstream = pipe(from_iter(vec![1, 2]), add(1));
    let downstream = pipe(downstream, add(100));
    assert_eq!(downstream.collect_vec().await?, vec![102, 103]);
    Ok(())
}

#[tokio::test]
async fn transform_merge_transform_takes_input_of_first() -> Result<()> {
    let mut combined = merge(add(1), add(2));
    combined.write(5).await?;
    combined.write(6).await?;
    combined.end();
    assert_eq!(combined.collect_vec().await?, vec![8, 9]);
    Ok(())
}

#[tokio::test]
async fn transform_merge_sink_is_a_sink() -> Result<()> {
    let store = Arc::new(Mutex::new(Vec::new()));
    let sink = add(1).merge(collecting_sink(Arc::clone(&store)));
    run(from_iter(vec![1, 2, 3]), sink).await?;
    assert_eq!(*store.lock().map_err(|e| anyhow::anyhow!("{e}"))?, vec![2, 3, 4]);
    Ok(())
}

#[tokio::test]
async fn written_items_reach_a_sink() -> Result<()> {
    let store = Arc::new(Mutex::new(Vec::new()));
    let mut sink = collecting_sink(Arc::clone(&store));
    sink.write(7).await?;
    sink.write(8).await?;
    sink.end();
    sink.finished().await?;
    assert_eq!(*store.lock().map_err(|e| anyhow::anyhow!("{e}"))?, vec![7, 8]);
    Ok(())
}

#[tokio::test]
async fn merged_failure_surfaces_through_composite() -> Result<()> {
    let composite = merge(failing(), add(1));
    let err = assert_stream_fails(from_iter(vec![1, 2, 3]).merge(composite)).await;
    assert_eq!(err.to_string(), "Test error");
    Ok(())
}

#[tokio::test]
async fn upstream_error_reaches_sink_completion() {
    let source = Source::from_results(futures::stream::iter(vec![
        Ok(1),
        Err(StreamError::composition("upstream broke")),
        Ok(3),
    ]));
    let store = Arc::new(Mutex::new(Vec::new()));
    let result = run(source, collecting_sink(Arc::clone(&store))).await;
    assert!(matches!(result, Err(StreamError::Composition(ref m)) if m == "upstream broke"));
    assert_eq!(*store.lock().unwrap(), vec![1]);
}

#[tokio::test]
async fn async_transform_failure_carries_index() {
    let t = wrap_transform(|x: i32| async move { if x == 3 { Err("three") } else { Ok(x * 2) } });
    let err = assert_stream_fails(from_iter(1..=5).merge(t)).await;
    assert!(matches!(err, StreamError::ItemCallback { index: 2, .. }));
    assert_eq!(err.to_string(), "callback failed for item #2: three");
}

#[tokio::test]
async fn wrap_sink_consumes_in_order() -> Result<()> {
    let store = Arc::new(Mutex::new(Vec::new()));
    let inner = Arc::clone(&store);
    let sink = wrap_sink(move |x: i32| {
        let inner = Arc::clone(&inner);
        async move {
            tokio::time::sleep(Duration::from_millis(1)).await;
            inner.lock().map(|mut s| s.push(x)).map_err(|e| e.to_string())
        }
    });
    run(from_iter(0..10), sink).await?;
    assert_eq!(*store.lock().map_err(|e| anyhow::anyhow!("{e}"))?, (0..10).collect::<Vec<_>>());
    Ok(())
}

#[tokio::test]
async fn full_buffer_suspends_writer() -> Result<()> {
    let options = StreamOptions { channel_capacity: 2 };
    let mut sink: Sink<i32> = Sink::from_consumer_fn_with(options, |mut inbox| async move {
        while let Some(item) = inbox.next().await {
            item?;
        }
        Ok(())
    });
    sink.write(1).await?;
    sink.write(2).await?;
    let blocked = tokio::time::timeout(Duration::from_millis(20), sink.write(3)).await;
    assert!(blocked.is_err(), "third write should wait for buffer space");

    let (mut inlet, completion) = sink.into_parts();
    let drain = tokio::spawn(completion);
    inlet.write(3).await?;
    inlet.end();
    drain.await??;
    Ok(())
}

#[tokio::test]
async fn transform_capacity_is_configurable() -> Result<()> {
    let options = StreamOptions { channel_capacity: 1 };
    let mut t: Transform<i32, i32> = Transform::from_stream_fn_with(options, |inbox| inbox);
    t.write(1).await?;
    let blocked = tokio::time::timeout(Duration::from_millis(20), t.write(2)).await;
    assert!(blocked.is_err(), "second write should wait for buffer space");

    let (mut inlet, output) = t.into_parts();
    let collected = tokio::spawn(output.collect_vec());
    inlet.write(2).await?;
    inlet.end();
    assert_eq!(collected.await??, vec![1, 2]);
    Ok(())
}

#[tokio::test]
async fn slow_consumer_bounds_producer_lead() -> Result<()> {
    let produced = Arc::new(Mutex::new(0usize));
    let counter = Arc::clone(&produced);
    let source = from_iter(0..1000).merge(map_transform(move |x: i32| {
        if let Ok(mut n) = counter.lock() {
            *n += 1;
        }
        Ok::<_, Infallible>(x)
    }));
    let mut source = std::pin::pin!(source);
    for _ in 0..5 {
        source.next().await;
    }
    tokio::time::sleep(Duration::from_millis(10)).await;
    let lead = *produced.lock().map_err(|e| anyhow::anyhow!("{e}"))?;
    assert!(lead < 100, "producer ran {lead} items ahead of a stalled consumer");
    Ok(())
}

#[tokio::test]
async fn connecting_a_sink_twice_is_rejected() {
    let store = Arc::new(Mutex::new(Vec::new()));
    let sink = pipe(from_iter(vec![1]), collecting_sink(store));
    let sink = pipe(from_iter(vec![2]), sink);
    let err = sink.finished().await.unwrap_err();
    assert!(matches!(err, StreamError::Composition(ref m) if m.contains("already connected")));
}

#[tokio::test]
async fn writing_after_end_fails_closed() {
    let mut t = add(1);
    t.end();
    assert!(matches!(t.write(1).await, Err(StreamError::Closed)));
}
