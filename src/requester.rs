use rayon::prelude::*;

use crate::{
    cache::FrameCache,
    error::AsciimateResult,
    gateway::FrameSource,
    model::{Frame, FrameRequest},
    retry::RetryPolicy,
};

/// How consecutive frames are derived.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Chaining {
    /// Frame N+1 is generated from frame N. Best animation coherence;
    /// inherently sequential.
    #[default]
    Chained,
    /// Every frame is generated from the source image. The only mode that
    /// admits concurrent requests.
    Static,
}

/// Controls for a batch of frame requests.
#[derive(Clone, Debug, Default)]
pub struct RequestOpts {
    pub chaining: Chaining,
    pub retry: RetryPolicy,
    /// Issue static-mode requests through a bounded worker pool.
    /// Ignored in chained mode.
    pub parallel: bool,
    /// Optional explicit worker thread count.
    pub threads: Option<usize>,
}

/// Aggregated request counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RequestStats {
    /// Gateway calls actually issued (cache hits excluded).
    pub frames_requested: u64,
    pub cache_hits: u64,
    pub retries: u64,
}

/// Generate one frame per prompt, in prompt order.
///
/// Output ordering always equals prompt ordering, regardless of the
/// completion order of concurrent requests.
pub fn request_frames(
    source: &Frame,
    prompts: &[String],
    gateway: &dyn FrameSource,
    cache: Option<&FrameCache>,
    opts: &RequestOpts,
) -> AsciimateResult<(Vec<Frame>, RequestStats)> {
    match opts.chaining {
        Chaining::Chained => request_chained(source, prompts, gateway, cache, opts),
        Chaining::Static if opts.parallel => {
            request_static_parallel(source, prompts, gateway, cache, opts)
        }
        Chaining::Static => request_static(source, prompts, gateway, cache, opts),
    }
}

struct FetchOutcome {
    frame: Frame,
    cache_hit: bool,
    retries: u32,
}

fn fetch_one(
    input: &Frame,
    prompt: &str,
    gateway: &dyn FrameSource,
    cache: Option<&FrameCache>,
    retry: &RetryPolicy,
) -> AsciimateResult<FetchOutcome> {
    if let Some(cache) = cache {
        let input_png = input.to_png_bytes()?;
        let key = FrameCache::key(gateway.model_id(), prompt, &input_png);
        if let Some(frame) = cache.lookup(&key)? {
            return Ok(FetchOutcome {
                frame,
                cache_hit: true,
                retries: 0,
            });
        }
        let (frame, retries) =
            retry.run_counted(|| gateway.request_frame(FrameRequest { image: input, prompt }))?;
        cache.store(&key, gateway.model_id(), prompt, &frame)?;
        return Ok(FetchOutcome {
            frame,
            cache_hit: false,
            retries,
        });
    }

    let (frame, retries) =
        retry.run_counted(|| gateway.request_frame(FrameRequest { image: input, prompt }))?;
    Ok(FetchOutcome {
        frame,
        cache_hit: false,
        retries,
    })
}

fn record(stats: &mut RequestStats, outcome: &FetchOutcome) {
    if outcome.cache_hit {
        stats.cache_hits += 1;
    } else {
        stats.frames_requested += 1;
    }
    stats.retries += u64::from(outcome.retries);
}

fn request_chained(
    source: &Frame,
    prompts: &[String],
    gateway: &dyn FrameSource,
    cache: Option<&FrameCache>,
    opts: &RequestOpts,
) -> AsciimateResult<(Vec<Frame>, RequestStats)> {
    let mut out = Vec::with_capacity(prompts.len());
    let mut stats = RequestStats::default();
    let mut input = source.clone();

    for prompt in prompts {
        let outcome = fetch_one(&input, prompt, gateway, cache, &opts.retry)?;
        record(&mut stats, &outcome);
        input = outcome.frame.clone();
        out.push(outcome.frame);
    }
    Ok((out, stats))
}

fn request_static(
    source: &Frame,
    prompts: &[String],
    gateway: &dyn FrameSource,
    cache: Option<&FrameCache>,
    opts: &RequestOpts,
) -> AsciimateResult<(Vec<Frame>, RequestStats)> {
    let mut out = Vec::with_capacity(prompts.len());
    let mut stats = RequestStats::default();

    for prompt in prompts {
        let outcome = fetch_one(source, prompt, gateway, cache, &opts.retry)?;
        record(&mut stats, &outcome);
        out.push(outcome.frame);
    }
    Ok((out, stats))
}

fn build_worker_pool(threads: Option<usize>) -> AsciimateResult<rayon::ThreadPool> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads.unwrap_or(0))
        .build()
        .map_err(|e| anyhow::anyhow!("failed to build worker pool: {e}").into())
}

fn request_static_parallel(
    source: &Frame,
    prompts: &[String],
    gateway: &dyn FrameSource,
    cache: Option<&FrameCache>,
    opts: &RequestOpts,
) -> AsciimateResult<(Vec<Frame>, RequestStats)> {
    let pool = build_worker_pool(opts.threads)?;

    let mut indexed: Vec<(usize, FetchOutcome)> = pool.install(|| {
        prompts
            .par_iter()
            .enumerate()
            .map(|(index, prompt)| {
                fetch_one(source, prompt, gateway, cache, &opts.retry)
                    .map(|outcome| (index, outcome))
            })
            .collect::<AsciimateResult<Vec<_>>>()
    })?;

    // Completion order is not guaranteed; restore request order by index.
    indexed.sort_by_key(|(index, _)| *index);

    let mut out = Vec::with_capacity(prompts.len());
    let mut stats = RequestStats::default();
    for (_, outcome) in indexed {
        record(&mut stats, &outcome);
        out.push(outcome.frame);
    }
    Ok((out, stats))
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::error::AsciimateError;

    fn solid(px: [u8; 4]) -> Frame {
        Frame::from_rgba(image::RgbaImage::from_pixel(2, 2, image::Rgba(px)))
    }

    /// Returns a frame whose red channel encodes the prompt's numeric value
    /// and whose green channel echoes the input's red channel.
    struct EchoSource;

    impl FrameSource for EchoSource {
        fn model_id(&self) -> &str {
            "echo"
        }

        fn request_frame(&self, req: FrameRequest<'_>) -> AsciimateResult<Frame> {
            let value: u8 = req.prompt.parse().expect("test prompts are numeric");
            let input_red = req.image.rgba().get_pixel(0, 0).0[0];
            Ok(solid([value, input_red, 0, 255]))
        }
    }

    fn prompts(values: &[u8]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn chained_mode_feeds_each_frame_into_the_next_request() {
        let source = solid([7, 0, 0, 255]);
        let opts = RequestOpts::default();
        let (frames, stats) =
            request_frames(&source, &prompts(&[1, 2, 3]), &EchoSource, None, &opts).unwrap();

        assert_eq!(frames.len(), 3);
        // green channel = red of the previous frame, proving the chain.
        assert_eq!(frames[0].rgba().get_pixel(0, 0).0[..2], [1, 7]);
        assert_eq!(frames[1].rgba().get_pixel(0, 0).0[..2], [2, 1]);
        assert_eq!(frames[2].rgba().get_pixel(0, 0).0[..2], [3, 2]);
        assert_eq!(stats.frames_requested, 3);
        assert_eq!(stats.cache_hits, 0);
    }

    #[test]
    fn static_mode_always_starts_from_the_source() {
        let source = solid([7, 0, 0, 255]);
        let opts = RequestOpts {
            chaining: Chaining::Static,
            ..Default::default()
        };
        let (frames, _) =
            request_frames(&source, &prompts(&[1, 2, 3]), &EchoSource, None, &opts).unwrap();

        for frame in &frames {
            assert_eq!(frame.rgba().get_pixel(0, 0).0[1], 7);
        }
    }

    #[test]
    fn parallel_static_mode_preserves_prompt_order() {
        let source = solid([0, 0, 0, 255]);
        let opts = RequestOpts {
            chaining: Chaining::Static,
            parallel: true,
            threads: Some(4),
            ..Default::default()
        };
        let values: Vec<u8> = (0..32).collect();
        let (frames, stats) =
            request_frames(&source, &prompts(&values), &EchoSource, None, &opts).unwrap();

        let got: Vec<u8> = frames
            .iter()
            .map(|f| f.rgba().get_pixel(0, 0).0[0])
            .collect();
        assert_eq!(got, values);
        assert_eq!(stats.frames_requested, 32);
    }

    #[test]
    fn cache_short_circuits_repeat_requests() {
        struct Counting(Mutex<u32>);
        impl FrameSource for Counting {
            fn model_id(&self) -> &str {
                "counting"
            }
            fn request_frame(&self, _req: FrameRequest<'_>) -> AsciimateResult<Frame> {
                *self.0.lock().unwrap() += 1;
                Ok(solid([5, 5, 5, 255]))
            }
        }

        let tmp = std::env::temp_dir().join(format!(
            "asciimate_requester_cache_{}_{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ));
        let cache = FrameCache::new(&tmp);
        let gateway = Counting(Mutex::new(0));
        let source = solid([0, 0, 0, 255]);
        let opts = RequestOpts {
            chaining: Chaining::Static,
            ..Default::default()
        };
        let ps = prompts(&[1, 2]);

        let (_, first) = request_frames(&source, &ps, &gateway, Some(&cache), &opts).unwrap();
        assert_eq!(first.frames_requested, 2);
        assert_eq!(first.cache_hits, 0);

        let (_, second) = request_frames(&source, &ps, &gateway, Some(&cache), &opts).unwrap();
        assert_eq!(second.frames_requested, 0);
        assert_eq!(second.cache_hits, 2);
        assert_eq!(*gateway.0.lock().unwrap(), 2);

        std::fs::remove_dir_all(&tmp).ok();
    }

    #[test]
    fn gateway_errors_propagate() {
        struct Failing;
        impl FrameSource for Failing {
            fn model_id(&self) -> &str {
                "failing"
            }
            fn request_frame(&self, _req: FrameRequest<'_>) -> AsciimateResult<Frame> {
                Err(AsciimateError::model("no image for you"))
            }
        }

        let err = request_frames(
            &solid([0, 0, 0, 255]),
            &prompts(&[1]),
            &Failing,
            None,
            &RequestOpts::default(),
        )
        .unwrap_err();
        assert!(matches!(err, AsciimateError::Model(_)));
    }
}
